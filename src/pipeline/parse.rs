//! Block parser: lower raw source records into the document model.
//!
//! ## Node construction
//!
//! The block type discriminator is mapped onto the closed [`BlobKind`] enum
//! first; an unknown discriminator aborts the document. The payload is then
//! read by shape, first match wins:
//!
//! 1. `rich_text`: styled text runs
//! 2. `caption`  : caption runs (image blocks)
//! 3. `expression`: a single equation run
//! 4. `cells`    : one run list per table cell
//! 5. nothing recognised: no text (dividers, containers)
//!
//! after which the few kind-specific fields (code language, checkbox, table
//! width, cached image path) are attached.
//!
//! Trees are lowered with an explicit stack, so deep nesting in the source
//! cannot exhaust the call stack.
//!
//! ## Properties
//!
//! Page properties are flattened into [`Properties`] by declared type and
//! then by value shape; see [`parse_properties`].

use crate::error::DocumentError;
use crate::model::{Blob, BlobKind, Properties, PropertyValue, TextRun, DEFAULT_COLOR};
use crate::notion::RawBlock;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;

/// Property key under which the page title is stored.
pub const TITLE_KEY: &str = "Title";

// ── Blocks ───────────────────────────────────────────────────────────────

/// Lower a list of resolved raw blocks, keeping their order.
///
/// `images` maps image block ids to their cached files.
pub fn parse_blocks(
    blocks: Vec<RawBlock>,
    images: &HashMap<String, PathBuf>,
) -> Result<Vec<Blob>, DocumentError> {
    blocks
        .into_iter()
        .map(|raw| parse_block(raw, images))
        .collect()
}

/// Lower one resolved raw block and its subtree.
pub fn parse_block(
    root: RawBlock,
    images: &HashMap<String, PathBuf>,
) -> Result<Blob, DocumentError> {
    struct Frame {
        raw: RawBlock,
        pending: std::vec::IntoIter<RawBlock>,
        done: Option<Vec<Blob>>,
    }

    fn open(mut raw: RawBlock) -> Result<Frame, DocumentError> {
        let children = raw.children.take();
        if raw.has_children && children.is_none() {
            return Err(DocumentError::MalformedSourceShape {
                id: std::mem::take(&mut raw.id),
                kind: std::mem::take(&mut raw.kind),
                detail: "children were not resolved before parsing".to_string(),
            });
        }
        let done = children.as_ref().map(|c| Vec::with_capacity(c.len()));
        Ok(Frame {
            raw,
            pending: children.unwrap_or_default().into_iter(),
            done,
        })
    }

    let mut stack = vec![open(root)?];
    while let Some(mut frame) = stack.pop() {
        if let Some(child) = frame.pending.next() {
            stack.push(frame);
            stack.push(open(child)?);
            continue;
        }
        let mut blob = build_node(&frame.raw, images)?;
        blob.children = frame.done;
        match stack.last_mut() {
            Some(parent) => parent.done.get_or_insert_with(Vec::new).push(blob),
            None => return Ok(blob),
        }
    }
    unreachable!("the root frame returns before the stack empties")
}

/// Build a single node from a raw block whose children are handled elsewhere.
fn build_node(raw: &RawBlock, images: &HashMap<String, PathBuf>) -> Result<Blob, DocumentError> {
    let kind = BlobKind::from_discriminator(&raw.kind)
        .ok_or_else(|| malformed(raw, "unrecognised block type"))?;
    let payload = &raw.payload;

    let mut blob = if let Some(runs) = payload.get("rich_text") {
        Blob::new(&raw.id, kind, parse_runs(runs, raw)?)
    } else if let Some(caption) = payload.get("caption") {
        let runs = parse_runs(caption, raw)?
            .into_iter()
            .map(|run| TextRun {
                is_caption: true,
                ..run
            })
            .collect();
        Blob::new(&raw.id, kind, runs)
    } else if let Some(expression) = payload.get("expression") {
        let expression = expression
            .as_str()
            .ok_or_else(|| malformed(raw, "equation expression is not a string"))?;
        let run = TextRun {
            is_equation: true,
            ..TextRun::plain(expression)
        };
        Blob::new(&raw.id, kind, vec![run])
    } else if let Some(cells) = payload.get("cells") {
        let cells = cells
            .as_array()
            .ok_or_else(|| malformed(raw, "table row cells are not a list"))?
            .iter()
            .map(|cell| parse_runs(cell, raw))
            .collect::<Result<Vec<_>, _>>()?;
        Blob::new(&raw.id, kind, vec![]).with_table_cells(cells)
    } else {
        Blob::new(&raw.id, kind, vec![])
    };

    match kind {
        BlobKind::Code => {
            if let Some(language) = payload.get("language").and_then(Value::as_str) {
                blob = blob.with_language(language);
            }
        }
        BlobKind::ToDo => {
            let checked = payload
                .get("checked")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            blob = blob.with_checked(checked);
        }
        BlobKind::Table => {
            if let Some(width) = payload.get("table_width").and_then(Value::as_u64) {
                blob = blob.with_table_width(width as usize);
            }
        }
        BlobKind::Heading1 | BlobKind::Heading2 | BlobKind::Heading3 => {
            let toggleable = payload
                .get("is_toggleable")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if toggleable {
                for run in &mut blob.runs {
                    run.is_toggleable = true;
                }
            }
        }
        BlobKind::Image => {
            let path = images
                .get(&raw.id)
                .ok_or_else(|| DocumentError::ResourceFetchError {
                    locator: raw.id.clone(),
                    reason: "image was not fetched into the cache".to_string(),
                })?;
            blob = blob.with_image(path.clone());
        }
        BlobKind::BulletedListItem
        | BlobKind::ChildPage
        | BlobKind::Column
        | BlobKind::ColumnList
        | BlobKind::Divider
        | BlobKind::Equation
        | BlobKind::NumberedListItem
        | BlobKind::Paragraph
        | BlobKind::Quote
        | BlobKind::TableRow => {}
    }

    Ok(blob)
}

fn malformed(raw: &RawBlock, detail: &str) -> DocumentError {
    DocumentError::MalformedSourceShape {
        id: raw.id.clone(),
        kind: raw.kind.clone(),
        detail: detail.to_string(),
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct WireRun {
    #[serde(rename = "type")]
    kind: Option<String>,
    plain_text: Option<String>,
    href: Option<String>,
    annotations: WireAnnotations,
}

#[derive(Deserialize)]
#[serde(default)]
struct WireAnnotations {
    bold: bool,
    italic: bool,
    strikethrough: bool,
    underline: bool,
    code: bool,
    color: String,
}

impl Default for WireAnnotations {
    fn default() -> Self {
        Self {
            bold: false,
            italic: false,
            strikethrough: false,
            underline: false,
            code: false,
            color: DEFAULT_COLOR.to_string(),
        }
    }
}

impl From<WireRun> for TextRun {
    fn from(wire: WireRun) -> Self {
        TextRun {
            text: wire.plain_text,
            bold: wire.annotations.bold,
            italic: wire.annotations.italic,
            strikethrough: wire.annotations.strikethrough,
            underline: wire.annotations.underline,
            code: wire.annotations.code,
            is_equation: wire.kind.as_deref() == Some("equation"),
            is_toggleable: false,
            is_caption: false,
            color: wire.annotations.color,
            link: wire.href,
        }
    }
}

/// Parse a rich-text list into runs.
fn parse_runs(value: &Value, raw: &RawBlock) -> Result<Vec<TextRun>, DocumentError> {
    let wire = Vec::<WireRun>::deserialize(value)
        .map_err(|e| malformed(raw, &format!("invalid rich text: {e}")))?;
    Ok(wire.into_iter().map(TextRun::from).collect())
}

// ── Properties ───────────────────────────────────────────────────────────

/// Flatten a page's property records.
///
/// | declared type | result |
/// |---|---|
/// | `title` | each run quoted as `'text'`; one run → string, else list; key [`TITLE_KEY`] |
/// | `relation` | dropped |
/// | anything else | the typed payload, flattened by shape (see [`flatten_value`]) |
pub fn parse_properties(records: &Map<String, Value>) -> Result<Properties, DocumentError> {
    let mut properties = Properties::new();

    for (key, record) in records {
        let declared = record
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| unsupported(key, record))?;

        match declared {
            "title" => {
                let runs = record
                    .get("title")
                    .and_then(Value::as_array)
                    .ok_or_else(|| unsupported(key, record))?;
                let mut quoted: Vec<String> = runs
                    .iter()
                    .map(|run| {
                        let text = run.get("plain_text").and_then(Value::as_str).unwrap_or("");
                        format!("'{text}'")
                    })
                    .collect();
                let value = if quoted.len() == 1 {
                    PropertyValue::Text(quoted.remove(0))
                } else {
                    PropertyValue::List(quoted)
                };
                properties.insert(TITLE_KEY, value);
            }
            "relation" => {}
            other => {
                let payload = record.get(other).unwrap_or(&Value::Null);
                properties.insert(key.clone(), flatten_value(key, payload)?);
            }
        }
    }

    Ok(properties)
}

/// Flatten one typed property payload by shape.
///
/// * scalar or null → copied
/// * list → nulls dropped, each item reduced to its name
/// * object → `name` (select, status), else `type` + same-named field unwrapped
///   one level (formula, rollup), else `prefix` + `number` as `prefix_number`
///   (unique id), else `start` (date)
pub fn flatten_value(key: &str, value: &Value) -> Result<PropertyValue, DocumentError> {
    match value {
        Value::Null => Ok(PropertyValue::Empty),
        Value::Bool(b) => Ok(PropertyValue::Bool(*b)),
        Value::String(s) => Ok(PropertyValue::Text(s.clone())),
        Value::Number(n) => Ok(match n.as_i64() {
            Some(i) => PropertyValue::Int(i),
            None => PropertyValue::Number(n.as_f64().unwrap_or_default()),
        }),
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| item_name(item).ok_or_else(|| unsupported(key, value)))
            .collect::<Result<Vec<_>, _>>()
            .map(PropertyValue::List),
        Value::Object(obj) => {
            if let Some(name) = obj.get("name").and_then(Value::as_str) {
                return Ok(PropertyValue::Text(name.to_string()));
            }
            if let Some(inner) = obj
                .get("type")
                .and_then(Value::as_str)
                .and_then(|t| obj.get(t))
            {
                return flatten_value(key, inner);
            }
            if let (Some(prefix), Some(number)) = (obj.get("prefix"), obj.get("number")) {
                return Ok(match prefix.as_str() {
                    Some(prefix) => PropertyValue::Text(format!("{prefix}_{number}")),
                    None => flatten_value(key, number)?,
                });
            }
            if let Some(start) = obj.get("start") {
                return Ok(match start.as_str() {
                    Some(start) => PropertyValue::Text(start.to_string()),
                    None => PropertyValue::Empty,
                });
            }
            Err(unsupported(key, value))
        }
    }
}

/// Plain name of a list item: a string, a named option, or a text run.
fn item_name(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj
            .get("name")
            .or_else(|| obj.get("plain_text"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn unsupported(key: &str, value: &Value) -> DocumentError {
    DocumentError::UnsupportedPropertyShape {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(content: &str) -> Value {
        json!({
            "type": "text",
            "plain_text": content,
            "href": null,
            "annotations": {
                "bold": false, "italic": false, "strikethrough": false,
                "underline": false, "code": false, "color": "default"
            }
        })
    }

    fn no_images() -> HashMap<String, PathBuf> {
        HashMap::new()
    }

    #[test]
    fn paragraph_runs_carry_annotations() {
        let raw = RawBlock::new(
            "p1",
            "paragraph",
            json!({
                "rich_text": [
                    {
                        "type": "text",
                        "plain_text": "bold link",
                        "href": "https://example.com",
                        "annotations": { "bold": true, "color": "yellow_background" }
                    },
                    { "type": "equation", "plain_text": "e=mc^2" }
                ],
                "color": "default"
            }),
        );

        let blob = parse_block(raw, &no_images()).unwrap();
        assert_eq!(blob.kind, BlobKind::Paragraph);
        assert_eq!(blob.runs.len(), 2);

        let first = &blob.runs[0];
        assert_eq!(first.text.as_deref(), Some("bold link"));
        assert!(first.bold && !first.italic);
        assert_eq!(first.link.as_deref(), Some("https://example.com"));
        assert!(first.highlight());
        assert!(!first.is_equation);

        let second = &blob.runs[1];
        assert!(second.is_equation);
        assert!(!second.highlight());
        assert_eq!(blob.children, None);
    }

    #[test]
    fn code_todo_and_table_fields() {
        let code = RawBlock::new(
            "c",
            "code",
            json!({ "rich_text": [text("fn main() {}")], "caption": [], "language": "rust" }),
        );
        let code = parse_block(code, &no_images()).unwrap();
        assert_eq!(code.language.as_deref(), Some("rust"));
        assert!(!code.runs[0].is_caption, "rich_text wins over caption");

        let todo = RawBlock::new("t", "to_do", json!({ "rich_text": [text("x")], "checked": true }));
        assert_eq!(parse_block(todo, &no_images()).unwrap().checked, Some(true));

        let row = RawBlock::new(
            "r",
            "table_row",
            json!({ "cells": [[text("a")], [text("b"), text("c")]] }),
        );
        let table = RawBlock::new(
            "tbl",
            "table",
            json!({ "table_width": 2, "has_column_header": true }),
        )
        .with_children(vec![row]);

        let table = parse_block(table, &no_images()).unwrap();
        assert_eq!(table.table_width, Some(2));
        let cells = table.children()[0].table_cells.as_ref().unwrap();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[1].len(), 2);
    }

    #[test]
    fn equation_and_divider() {
        let eq = RawBlock::new("e", "equation", json!({ "expression": "a^2+b^2" }));
        let eq = parse_block(eq, &no_images()).unwrap();
        assert_eq!(eq.runs.len(), 1);
        assert!(eq.runs[0].is_equation);
        assert_eq!(eq.runs[0].text.as_deref(), Some("a^2+b^2"));

        let div = parse_block(RawBlock::new("d", "divider", json!({})), &no_images()).unwrap();
        assert!(div.runs.is_empty());
    }

    #[test]
    fn image_caption_and_cached_path() {
        let raw = RawBlock::new(
            "img",
            "image",
            json!({
                "caption": [text("A cat")],
                "type": "external",
                "external": { "url": "https://cdn/cat.png" }
            }),
        );
        let mut images = HashMap::new();
        images.insert("img".to_string(), PathBuf::from("/tmp/cache/abc.png"));

        let blob = parse_block(raw.clone(), &images).unwrap();
        assert!(blob.runs[0].is_caption);
        assert_eq!(blob.image, Some(PathBuf::from("/tmp/cache/abc.png")));

        let err = parse_block(raw, &no_images()).unwrap_err();
        assert!(matches!(err, DocumentError::ResourceFetchError { .. }));
    }

    #[test]
    fn toggleable_heading_marks_runs() {
        let raw = RawBlock::new(
            "h",
            "heading_2",
            json!({ "rich_text": [text("Details")], "is_toggleable": true }),
        );
        let blob = parse_block(raw, &no_images()).unwrap();
        assert!(blob.runs.iter().all(|r| r.is_toggleable));
    }

    #[test]
    fn unknown_block_type_fails_loudly() {
        let child = RawBlock::new("x", "synced_block", json!({}));
        let parent = RawBlock::new("p", "paragraph", json!({ "rich_text": [] }))
            .with_children(vec![child]);

        match parse_block(parent, &no_images()) {
            Err(DocumentError::MalformedSourceShape { id, kind, .. }) => {
                assert_eq!(id, "x");
                assert_eq!(kind, "synced_block");
            }
            other => panic!("expected MalformedSourceShape, got {other:?}"),
        }
    }

    #[test]
    fn unresolved_children_are_rejected() {
        let mut raw = RawBlock::new("p", "paragraph", json!({ "rich_text": [] }));
        raw.has_children = true;
        let err = parse_block(raw, &no_images()).unwrap_err();
        assert!(matches!(err, DocumentError::MalformedSourceShape { .. }));
    }

    #[test]
    fn deep_nesting_does_not_overflow() {
        let mut node = RawBlock::new("leaf", "bulleted_list_item", json!({ "rich_text": [text("x")] }));
        for i in 0..100_000 {
            node = RawBlock::new(format!("n{i}"), "bulleted_list_item", json!({ "rich_text": [] }))
                .with_children(vec![node]);
        }
        let blob = parse_block(node, &no_images()).unwrap();
        assert_eq!(blob.children().len(), 1);
        assert_eq!(blob.image_paths().len(), 0);
    }

    #[test]
    fn title_with_one_run_is_quoted_string() {
        let records = json!({
            "Name": { "id": "title", "type": "title", "title": [text("Foo")] }
        });
        let props = parse_properties(records.as_object().unwrap()).unwrap();
        assert_eq!(props.get("Title"), Some(&PropertyValue::Text("'Foo'".into())));
        assert_eq!(props.get("Name"), None);
    }

    #[test]
    fn title_with_two_runs_is_quoted_list() {
        let records = json!({
            "Name": { "type": "title", "title": [text("Foo"), text("Bar")] }
        });
        let props = parse_properties(records.as_object().unwrap()).unwrap();
        assert_eq!(
            props.get("Title"),
            Some(&PropertyValue::List(vec!["'Foo'".into(), "'Bar'".into()]))
        );
    }

    #[test]
    fn property_shapes_flatten() {
        let records = json!({
            "Related": { "type": "relation", "relation": [{ "id": "abc" }] },
            "Published": { "type": "checkbox", "checkbox": true },
            "Views": { "type": "number", "number": 42 },
            "Score": { "type": "number", "number": 4.5 },
            "Slug": { "type": "url", "url": null },
            "Tags": { "type": "multi_select", "multi_select": [{ "name": "rust" }, null, { "name": "notion" }] },
            "Status": { "type": "status", "status": { "id": "1", "name": "Done", "color": "green" } },
            "Words": { "type": "formula", "formula": { "type": "number", "number": 120 } },
            "Key": { "type": "unique_id", "unique_id": { "prefix": "POST", "number": 7 } },
            "Date": { "type": "date", "date": { "start": "2024-01-02", "end": null } },
            "Summary": { "type": "rich_text", "rich_text": [text("short")] }
        });
        let props = parse_properties(records.as_object().unwrap()).unwrap();

        assert_eq!(props.get("Related"), None);
        assert_eq!(props.get("Published"), Some(&PropertyValue::Bool(true)));
        assert_eq!(props.get("Views"), Some(&PropertyValue::Int(42)));
        assert_eq!(props.get("Score"), Some(&PropertyValue::Number(4.5)));
        assert_eq!(props.get("Slug"), Some(&PropertyValue::Empty));
        assert_eq!(
            props.get("Tags"),
            Some(&PropertyValue::List(vec!["rust".into(), "notion".into()]))
        );
        assert_eq!(props.get("Status"), Some(&PropertyValue::Text("Done".into())));
        assert_eq!(props.get("Words"), Some(&PropertyValue::Int(120)));
        assert_eq!(props.get("Key"), Some(&PropertyValue::Text("POST_7".into())));
        assert_eq!(props.get("Date"), Some(&PropertyValue::Text("2024-01-02".into())));
        assert_eq!(
            props.get("Summary"),
            Some(&PropertyValue::List(vec!["short".into()]))
        );

        let keys: Vec<_> = props.iter().map(|(k, _)| k).collect();
        assert_eq!(keys[0], "Published", "source order is kept");
    }

    #[test]
    fn unknown_object_shape_names_key() {
        let records = json!({
            "Weird": { "type": "mystery", "mystery": { "foo": 1 } }
        });
        match parse_properties(records.as_object().unwrap()) {
            Err(DocumentError::UnsupportedPropertyShape { key, value }) => {
                assert_eq!(key, "Weird");
                assert!(value.contains("foo"));
            }
            other => panic!("expected UnsupportedPropertyShape, got {other:?}"),
        }
    }
}
