//! Transform stage: frame a document for the static-site generator.
//!
//! A formatter only ever sets a document's header and footer; its blocks and
//! properties pass through untouched.

use crate::config::HugoFormatterConfig;
use crate::model::{Blob, BlobKind, Document, TextRun};

/// Transform stage of the pipeline.
pub trait Formatter: Send + Sync {
    fn format(&self, document: Document) -> Document;
}

/// Adds a Hugo front-matter header built from the page properties.
#[derive(Debug, Clone, Default)]
pub struct HugoFormatter {
    _config: HugoFormatterConfig,
}

impl HugoFormatter {
    pub fn new(config: HugoFormatterConfig) -> Self {
        Self { _config: config }
    }
}

impl Formatter for HugoFormatter {
    fn format(&self, document: Document) -> Document {
        let header = front_matter(&document);
        document.with_frame(Some(header), None)
    }
}

/// Front-matter block for a document.
///
/// ```text
/// ---
/// # ID: <page id>
/// <key>: <value>     (sorted by key, empty values skipped)
/// ---
/// ```
pub fn front_matter(document: &Document) -> Blob {
    let mut lines = vec![format!("# ID: {}", document.id)];
    lines.extend(
        document
            .properties
            .sorted()
            .into_iter()
            .filter(|(_, value)| value.is_truthy())
            .map(|(key, value)| format!("{key}: {value}")),
    );

    Blob::new(
        "header",
        BlobKind::Paragraph,
        vec![
            TextRun::plain("---\n"),
            TextRun::plain(lines.join("\n")),
            TextRun::plain("\n---\n"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Properties, PropertyValue};
    use crate::pipeline::render::render;

    fn sample() -> Document {
        let mut props = Properties::new();
        props.insert("Title", PropertyValue::Text("'Hello'".into()));
        props.insert("Draft", PropertyValue::Bool(false));
        props.insert("Tags", PropertyValue::List(vec!["a".into(), "b".into()]));
        props.insert("Date", PropertyValue::Text("2024-03-01".into()));
        props.insert("Empty", PropertyValue::Empty);
        Document::new(
            "page-1",
            props,
            vec![Blob::new("p", BlobKind::Paragraph, vec![TextRun::plain("body")])],
        )
    }

    #[test]
    fn header_lists_sorted_truthy_properties() {
        let doc = HugoFormatter::default().format(sample());
        let header = doc.header.as_ref().unwrap();
        assert_eq!(
            render(header, 0).unwrap(),
            "\n---\n# ID: page-1\nDate: 2024-03-01\nTags: [\"a\", \"b\"]\nTitle: 'Hello'\n---\n"
        );
        assert!(doc.footer.is_none());
    }

    #[test]
    fn blocks_and_properties_pass_through() {
        let original = sample();
        let formatted = HugoFormatter::default().format(original.clone());
        assert_eq!(formatted.blocks, original.blocks);
        assert_eq!(formatted.properties, original.properties);
        assert_eq!(formatted.id, original.id);
    }
}
