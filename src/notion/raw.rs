//! Raw records as the Notion API delivers them, before any interpretation.

use serde::Deserialize;
use serde_json::{Map, Value};

/// One content block, still in source shape.
///
/// `payload` is the object stored under the block's own type key (for a
/// `paragraph` block, the value of `"paragraph"`). `children` is `None` until
/// the tree resolver has fetched them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "WireBlock")]
pub struct RawBlock {
    pub id: String,
    pub kind: String,
    pub payload: Value,
    pub has_children: bool,
    pub children: Option<Vec<RawBlock>>,
}

impl RawBlock {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            payload,
            has_children: false,
            children: None,
        }
    }

    /// Same block with `children` attached and `has_children` set accordingly.
    pub fn with_children(mut self, children: Vec<RawBlock>) -> Self {
        self.has_children = !children.is_empty();
        self.children = Some(children);
        self
    }
}

// Tears the tree down level by level instead of recursing per nesting level.
impl Drop for RawBlock {
    fn drop(&mut self) {
        let mut pending = match self.children.take() {
            Some(children) => children,
            None => return,
        };
        while let Some(mut block) = pending.pop() {
            if let Some(children) = block.children.take() {
                pending.extend(children);
            }
        }
    }
}

#[derive(Deserialize)]
struct WireBlock {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    has_children: bool,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl From<WireBlock> for RawBlock {
    fn from(mut wire: WireBlock) -> Self {
        let payload = wire.rest.remove(&wire.kind).unwrap_or(Value::Null);
        Self {
            id: wire.id,
            kind: wire.kind,
            payload,
            has_children: wire.has_children,
            children: None,
        }
    }
}

/// Page metadata returned by a database query.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawPage {
    pub id: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub last_edited_time: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Property records keyed by property name, in source order.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn block_payload_is_lifted_from_type_key() {
        let block: RawBlock = serde_json::from_value(json!({
            "object": "block",
            "id": "b1",
            "type": "to_do",
            "has_children": true,
            "to_do": { "rich_text": [], "checked": true }
        }))
        .unwrap();

        assert_eq!(block.id, "b1");
        assert_eq!(block.kind, "to_do");
        assert!(block.has_children);
        assert_eq!(block.payload["checked"], json!(true));
        assert_eq!(block.children, None);
    }

    #[test]
    fn block_without_payload_gets_null() {
        let block: RawBlock =
            serde_json::from_value(json!({ "id": "d", "type": "divider" })).unwrap();
        assert_eq!(block.payload, Value::Null);
        assert!(!block.has_children);
    }

    #[test]
    fn page_properties_keep_source_order() {
        let page: RawPage = serde_json::from_value(json!({
            "object": "page",
            "id": "p1",
            "properties": { "Zeta": {}, "Alpha": {} }
        }))
        .unwrap();
        let keys: Vec<_> = page.properties.keys().collect();
        assert_eq!(keys, ["Zeta", "Alpha"]);
    }

    #[test]
    fn deep_tree_drops_without_overflow() {
        let mut node = RawBlock::new("leaf", "paragraph", Value::Null);
        for i in 0..200_000 {
            node = RawBlock::new(format!("n{i}"), "paragraph", Value::Null).with_children(vec![node]);
        }
        drop(node);
    }
}
