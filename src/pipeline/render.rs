//! Markdown rendering: project a [`Blob`] tree onto Markdown text.
//!
//! ## Layout rules
//!
//! Every rendered node starts on a fresh line (the output of [`render`] is
//! prefixed with `\n`), so siblings joined with `\n` end up separated by a
//! blank line. List-like and paragraph-like nodes render their children four
//! spaces deeper; tables and containers keep the current indent; quotes
//! flatten their direct children into extra `> ` lines and ignore anything
//! below them.
//!
//! ## Text styling
//!
//! A run is wrapped in a fixed order, innermost first:
//!
//! ```text
//! bold → italic → strikethrough → underline → code → link → equation → highlight
//! ```
//!
//! so `{bold, italic, link}` always yields `[_**x**_](u)`.
//!
//! Rendering never mutates a node and keeps no state between calls; the same
//! node at the same indent always yields the same text. Nested trees are
//! walked with an explicit stack.

use crate::error::DocumentError;
use crate::model::{Blob, BlobKind, TextRun};

/// Extra indent per nesting level, in spaces.
pub const INDENT_STEP: usize = 4;

/// Name of the per-post image directory that figure paths point into.
pub const POST_IMAGES_DIR: &str = "images";

/// Literal emitted for a divider.
const HORIZONTAL_RULE: &str = "\n---\n";

/// Style one run. An empty or absent text yields an empty string.
pub fn style_run(run: &TextRun) -> String {
    let mut t = match run.text.as_deref() {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => return String::new(),
    };
    if run.bold {
        t = format!("**{t}**");
    }
    if run.italic {
        t = format!("_{t}_");
    }
    if run.strikethrough {
        t = format!("~~{t}~~");
    }
    if run.underline {
        t = format!("<ins>{t}</ins>");
    }
    if run.code {
        t = format!("`{t}`");
    }
    if let Some(ref link) = run.link {
        t = format!("[{t}]({link})");
    }
    if run.is_equation {
        t = format!("$ {t} $");
    }
    if run.highlight() {
        t = format!("<mark>{t}</mark>");
    }
    t
}

/// Style and concatenate a run list.
pub fn style_runs(runs: &[TextRun]) -> String {
    runs.iter().map(style_run).collect()
}

/// Render an optional node; `None` renders as empty text.
pub fn render_optional(blob: Option<&Blob>, indent: usize) -> Result<String, DocumentError> {
    match blob {
        Some(blob) => render(blob, indent),
        None => Ok(String::new()),
    }
}

/// Render a node and its subtree at `indent` spaces.
pub fn render(root: &Blob, indent: usize) -> Result<String, DocumentError> {
    struct Frame<'a> {
        blob: &'a Blob,
        indent: usize,
        child_indent: Option<usize>,
        next: usize,
        rendered: Vec<String>,
    }

    fn open(blob: &Blob, indent: usize) -> Frame<'_> {
        Frame {
            blob,
            indent,
            child_indent: child_indent(blob.kind, indent),
            next: 0,
            rendered: Vec::new(),
        }
    }

    let mut stack = vec![open(root, indent)];
    while let Some(mut frame) = stack.pop() {
        let blob = frame.blob;
        if let Some(child_indent) = frame.child_indent {
            if let Some(child) = blob.children().get(frame.next) {
                frame.next += 1;
                stack.push(frame);
                stack.push(open(child, child_indent));
                continue;
            }
        }
        let text = format!("\n{}", compose(blob, frame.indent, frame.rendered)?);
        match stack.last_mut() {
            Some(parent) => parent.rendered.push(text),
            None => return Ok(text),
        }
    }
    unreachable!("the root frame returns before the stack empties")
}

/// Indent at which a node's children are rendered, or `None` when its
/// children are not rendered as nodes of their own.
fn child_indent(kind: BlobKind, indent: usize) -> Option<usize> {
    match kind {
        BlobKind::Paragraph
        | BlobKind::Heading1
        | BlobKind::Heading2
        | BlobKind::Heading3
        | BlobKind::Code
        | BlobKind::Equation
        | BlobKind::BulletedListItem
        | BlobKind::NumberedListItem
        | BlobKind::ToDo => Some(indent + INDENT_STEP),
        BlobKind::Table | BlobKind::Column | BlobKind::ColumnList => Some(indent),
        BlobKind::Quote
        | BlobKind::Divider
        | BlobKind::Image
        | BlobKind::TableRow
        | BlobKind::ChildPage => None,
    }
}

/// Assemble one node's text from its already-rendered children.
fn compose(blob: &Blob, indent: usize, children: Vec<String>) -> Result<String, DocumentError> {
    let text = match blob.kind {
        BlobKind::Paragraph => paragraph(blob, children),
        BlobKind::Heading1 => format!("# {}", paragraph(blob, children)),
        BlobKind::Heading2 => format!("## {}", paragraph(blob, children)),
        BlobKind::Heading3 => format!("### {}", paragraph(blob, children)),
        BlobKind::Divider => HORIZONTAL_RULE.to_string(),
        BlobKind::Equation => format!("$$\n{}\n$$", paragraph(blob, children)),
        BlobKind::Code => format!(
            "```{}\n{}\n```",
            blob.language.as_deref().unwrap_or(""),
            paragraph(blob, children)
        ),
        BlobKind::BulletedListItem => list_item(blob, "-", indent, children),
        // No ordinal tracking: every item carries the same marker.
        BlobKind::NumberedListItem => list_item(blob, "1.", indent, children),
        BlobKind::ToDo => {
            let marker = if blob.checked.unwrap_or(false) {
                "- [X]"
            } else {
                "- [ ]"
            };
            list_item(blob, marker, indent, children)
        }
        BlobKind::Quote => quote(blob),
        BlobKind::Table => table(blob, children)?,
        BlobKind::TableRow => table_row(blob)?,
        BlobKind::Image => image(blob)?,
        BlobKind::Column | BlobKind::ColumnList => children.join("\n"),
        BlobKind::ChildPage => {
            return Err(DocumentError::UnsupportedNodeKind {
                kind: blob.kind.to_string(),
                id: blob.id.clone(),
            })
        }
    };
    Ok(text)
}

fn paragraph(blob: &Blob, children: Vec<String>) -> String {
    let mut lines = Vec::with_capacity(children.len() + 1);
    lines.push(style_runs(&blob.runs));
    lines.extend(children);
    lines.join("\n")
}

fn list_item(blob: &Blob, marker: &str, indent: usize, children: Vec<String>) -> String {
    let whitespace = " ".repeat(indent);
    let mut lines = Vec::with_capacity(children.len() + 1);
    lines.push(format!("{whitespace}{marker} {}", style_runs(&blob.runs)));
    lines.extend(children);
    lines.join("\n")
}

fn quote(blob: &Blob) -> String {
    let mut lines = vec![format!("> {}", style_runs(&blob.runs))];
    lines.extend(
        blob.children()
            .iter()
            .map(|child| format!("> {}", style_runs(&child.runs))),
    );
    lines.join("\n>\n")
}

fn table(blob: &Blob, mut rows: Vec<String>) -> Result<String, DocumentError> {
    let width = blob.table_width.ok_or_else(|| missing(blob, "table_width"))?;
    if !rows.is_empty() {
        rows.insert(1, format!("\n|{}", "---|".repeat(width)));
    }
    Ok(rows.concat())
}

fn table_row(blob: &Blob) -> Result<String, DocumentError> {
    let cells = blob
        .table_cells
        .as_ref()
        .ok_or_else(|| missing(blob, "table_cells"))?;
    let cells: Vec<String> = cells.iter().map(|cell| style_runs(cell)).collect();
    Ok(format!("| {} |", cells.join(" | ")))
}

fn image(blob: &Blob) -> Result<String, DocumentError> {
    let path = blob
        .image
        .as_deref()
        .filter(|p| p.is_file())
        .ok_or_else(|| missing(blob, "image"))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| missing(blob, "image"))?
        .to_string_lossy();
    let caption = style_runs(&blob.runs).replace('"', "&quot;");
    Ok(format!(
        "{{{{< figure src=\"{POST_IMAGES_DIR}/{file_name}\" caption=\"{caption}\" align=\"center\" >}}}}"
    ))
}

fn missing(blob: &Blob, field: &'static str) -> DocumentError {
    DocumentError::IncompleteRequiredField {
        kind: blob.kind.to_string(),
        id: blob.id.clone(),
        field,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(text: &str) -> Blob {
        Blob::new("p", BlobKind::Paragraph, vec![TextRun::plain(text)])
    }

    fn row(id: &str, cells: &[&str]) -> Blob {
        Blob::new(id, BlobKind::TableRow, vec![]).with_table_cells(
            cells.iter().map(|c| vec![TextRun::plain(*c)]).collect(),
        )
    }

    #[test]
    fn style_order_is_fixed() {
        let run = TextRun {
            bold: true,
            italic: true,
            link: Some("u".into()),
            ..TextRun::plain("x")
        };
        assert_eq!(style_run(&run), "[_**x**_](u)");
    }

    #[test]
    fn every_wrap_composes_outward() {
        let run = TextRun {
            bold: true,
            italic: true,
            strikethrough: true,
            underline: true,
            code: true,
            is_equation: true,
            link: Some("u".into()),
            color: "red".into(),
            ..TextRun::plain("x")
        };
        assert_eq!(
            style_run(&run),
            "<mark>$ [`<ins>~~_**x**_~~</ins>`](u) $</mark>"
        );
    }

    #[test]
    fn empty_run_renders_nothing() {
        let bold_empty = TextRun {
            bold: true,
            ..TextRun::plain("")
        };
        assert_eq!(style_run(&bold_empty), "");
        assert_eq!(style_run(&TextRun::default()), "");
        assert_eq!(
            style_runs(&[TextRun::plain("a"), bold_empty, TextRun::plain("b")]),
            "ab"
        );
    }

    #[test]
    fn absent_node_renders_empty() {
        assert_eq!(render_optional(None, 0).unwrap(), "");
        assert_eq!(render_optional(Some(&para("x")), 0).unwrap(), "\nx");
    }

    #[test]
    fn headings_divider_equation_code() {
        let h = Blob::new("h", BlobKind::Heading2, vec![TextRun::plain("Title")]);
        assert_eq!(render(&h, 0).unwrap(), "\n## Title");

        let d = Blob::new("d", BlobKind::Divider, vec![]);
        assert_eq!(render(&d, 0).unwrap(), "\n\n---\n");

        let eq = Blob::new(
            "e",
            BlobKind::Equation,
            vec![TextRun {
                is_equation: false,
                ..TextRun::plain("a+b")
            }],
        );
        assert_eq!(render(&eq, 0).unwrap(), "\n$$\na+b\n$$");

        let code = Blob::new("c", BlobKind::Code, vec![TextRun::plain("let x = 1;")])
            .with_language("rust");
        assert_eq!(render(&code, 0).unwrap(), "\n```rust\nlet x = 1;\n```");
    }

    #[test]
    fn nested_lists_indent_by_four() {
        let inner = Blob::new("i", BlobKind::NumberedListItem, vec![TextRun::plain("inner")]);
        let outer = Blob::new("o", BlobKind::BulletedListItem, vec![TextRun::plain("outer")])
            .with_children(vec![inner.clone(), inner]);
        assert_eq!(
            render(&outer, 0).unwrap(),
            "\n- outer\n\n    1. inner\n\n    1. inner"
        );
    }

    #[test]
    fn todo_marks_checkbox() {
        let done = Blob::new("t", BlobKind::ToDo, vec![TextRun::plain("ship")]).with_checked(true);
        let open = Blob::new("t", BlobKind::ToDo, vec![TextRun::plain("test")]).with_checked(false);
        assert_eq!(render(&done, 4).unwrap(), "\n    - [X] ship");
        assert_eq!(render(&open, 0).unwrap(), "\n- [ ] test");
    }

    #[test]
    fn quote_flattens_only_direct_children() {
        let grandchild = para("hidden");
        let child = para("second").with_children(vec![grandchild]);
        let quote = Blob::new("q", BlobKind::Quote, vec![TextRun::plain("first")])
            .with_children(vec![child]);
        assert_eq!(render(&quote, 8).unwrap(), "\n> first\n>\n> second");
    }

    #[test]
    fn table_inserts_separator_after_first_row() {
        let table = Blob::new("t", BlobKind::Table, vec![])
            .with_table_width(2)
            .with_children(vec![row("r1", &["a", "b"]), row("r2", &["c", "d"])]);
        let md = render(&table, 0).unwrap();
        let lines: Vec<&str> = md.trim().lines().collect();
        assert_eq!(lines, ["| a | b |", "|---|---|", "| c | d |"]);
    }

    #[test]
    fn table_separator_matches_width() {
        for width in 1..=5 {
            let cells: Vec<String> = (0..width).map(|i| i.to_string()).collect();
            let cells: Vec<&str> = cells.iter().map(String::as_str).collect();
            let table = Blob::new("t", BlobKind::Table, vec![])
                .with_table_width(width)
                .with_children(vec![row("r", &cells)]);
            let md = render(&table, 0).unwrap();
            let sep = md.trim().lines().nth(1).unwrap();
            assert_eq!(sep.matches("---|").count(), width);
        }
    }

    #[test]
    fn table_without_width_is_incomplete() {
        let table = Blob::new("t", BlobKind::Table, vec![]).with_children(vec![row("r", &["a"])]);
        match render(&table, 0) {
            Err(DocumentError::IncompleteRequiredField { field, .. }) => {
                assert_eq!(field, "table_width")
            }
            other => panic!("expected IncompleteRequiredField, got {other:?}"),
        }

        let bare_row = Blob::new("r", BlobKind::TableRow, vec![]);
        assert!(matches!(
            render(&bare_row, 0),
            Err(DocumentError::IncompleteRequiredField { field: "table_cells", .. })
        ));
    }

    #[test]
    fn image_renders_figure_with_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.png");
        std::fs::write(&path, b"png").unwrap();

        let caption = TextRun {
            is_caption: true,
            italic: true,
            ..TextRun::plain("A \"cat\"")
        };
        let blob = Blob::new("img", BlobKind::Image, vec![caption]).with_image(&path);
        assert_eq!(
            render(&blob, 0).unwrap(),
            "\n{{< figure src=\"images/abc.png\" caption=\"_A &quot;cat&quot;_\" align=\"center\" >}}"
        );
    }

    #[test]
    fn image_without_file_is_incomplete() {
        let blob = Blob::new("img", BlobKind::Image, vec![]).with_image("/definitely/missing.png");
        assert!(matches!(
            render(&blob, 0),
            Err(DocumentError::IncompleteRequiredField { field: "image", .. })
        ));
    }

    #[test]
    fn child_page_is_unsupported() {
        let blob = Blob::new("cp", BlobKind::ChildPage, vec![]);
        match render(&blob, 0) {
            Err(DocumentError::UnsupportedNodeKind { kind, id }) => {
                assert_eq!(kind, "child_page");
                assert_eq!(id, "cp");
            }
            other => panic!("expected UnsupportedNodeKind, got {other:?}"),
        }
    }

    #[test]
    fn columns_keep_indent() {
        let item = Blob::new("li", BlobKind::BulletedListItem, vec![TextRun::plain("x")]);
        let column = Blob::new("c", BlobKind::Column, vec![]).with_children(vec![item]);
        let list = Blob::new("cl", BlobKind::ColumnList, vec![]).with_children(vec![column]);
        assert_eq!(render(&list, 0).unwrap().trim(), "- x");
    }

    #[test]
    fn rendering_is_idempotent() {
        let tree = para("root").with_children(vec![
            Blob::new("l", BlobKind::BulletedListItem, vec![TextRun::plain("a")]),
            Blob::new("d", BlobKind::Divider, vec![]),
        ]);
        for indent in [0, 4, 8] {
            assert_eq!(render(&tree, indent).unwrap(), render(&tree, indent).unwrap());
        }
    }

    #[test]
    fn deep_containers_render_without_recursion() {
        let mut node = para("leaf");
        for _ in 0..3_000 {
            node = Blob::new("c", BlobKind::Column, vec![]).with_children(vec![node]);
        }
        let md = render(&node, 0).unwrap();
        assert_eq!(md.trim(), "leaf");
    }
}
