//! In-memory document model shared by every pipeline stage.
//!
//! ```text
//! Document
//!  ├─ properties   key → PropertyValue (insertion order kept)
//!  ├─ header?      Blob
//!  ├─ blocks       [Blob]
//!  │                ├─ runs       [TextRun]
//!  │                └─ children?  [Blob]  (recursive)
//!  └─ footer?      Blob
//! ```
//!
//! Values are built once by the parser and then only ever replaced, never
//! edited: stages that need a different node (the exporter relocating an
//! image, the formatter adding a header) construct a new value and hand it on.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Colour value the source uses for "no colour".
pub const DEFAULT_COLOR: &str = "default";

// ── Text runs ────────────────────────────────────────────────────────────

/// A fragment of text with independent style flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: Option<String>,
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub underline: bool,
    pub code: bool,
    pub is_equation: bool,
    pub is_toggleable: bool,
    pub is_caption: bool,
    pub color: String,
    pub link: Option<String>,
}

impl Default for TextRun {
    fn default() -> Self {
        Self {
            text: None,
            bold: false,
            italic: false,
            strikethrough: false,
            underline: false,
            code: false,
            is_equation: false,
            is_toggleable: false,
            is_caption: false,
            color: DEFAULT_COLOR.to_string(),
            link: None,
        }
    }
}

impl TextRun {
    /// An unstyled run.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Whether the run is highlighted. Derived from `color`, never stored.
    pub fn highlight(&self) -> bool {
        self.color != DEFAULT_COLOR
    }
}

// ── Nodes ────────────────────────────────────────────────────────────────

/// Every node kind the parser can lower a source block into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobKind {
    BulletedListItem,
    ChildPage,
    Code,
    Column,
    ColumnList,
    Divider,
    Equation,
    Heading1,
    Heading2,
    Heading3,
    Image,
    NumberedListItem,
    Paragraph,
    Quote,
    Table,
    TableRow,
    ToDo,
}

impl BlobKind {
    /// Map a source type discriminator onto a kind.
    pub fn from_discriminator(s: &str) -> Option<Self> {
        let kind = match s {
            "bulleted_list_item" => Self::BulletedListItem,
            "child_page" => Self::ChildPage,
            "code" => Self::Code,
            "column" => Self::Column,
            "column_list" => Self::ColumnList,
            "divider" => Self::Divider,
            "equation" => Self::Equation,
            "heading_1" => Self::Heading1,
            "heading_2" => Self::Heading2,
            "heading_3" => Self::Heading3,
            "image" => Self::Image,
            "numbered_list_item" => Self::NumberedListItem,
            "paragraph" => Self::Paragraph,
            "quote" => Self::Quote,
            "table" => Self::Table,
            "table_row" => Self::TableRow,
            "to_do" => Self::ToDo,
            _ => return None,
        };
        Some(kind)
    }

    /// The source discriminator for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BulletedListItem => "bulleted_list_item",
            Self::ChildPage => "child_page",
            Self::Code => "code",
            Self::Column => "column",
            Self::ColumnList => "column_list",
            Self::Divider => "divider",
            Self::Equation => "equation",
            Self::Heading1 => "heading_1",
            Self::Heading2 => "heading_2",
            Self::Heading3 => "heading_3",
            Self::Image => "image",
            Self::NumberedListItem => "numbered_list_item",
            Self::Paragraph => "paragraph",
            Self::Quote => "quote",
            Self::Table => "table",
            Self::TableRow => "table_row",
            Self::ToDo => "to_do",
        }
    }
}

impl fmt::Display for BlobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of the document tree.
///
/// Only the payload fields relevant to `kind` are set; the rest stay `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub id: String,
    pub kind: BlobKind,
    pub runs: Vec<TextRun>,
    pub children: Option<Vec<Blob>>,
    /// Local file backing an `Image` node.
    pub image: Option<PathBuf>,
    /// Language tag of a `Code` node.
    pub language: Option<String>,
    /// Column count of a `Table` node.
    pub table_width: Option<usize>,
    /// One run list per cell of a `TableRow` node.
    pub table_cells: Option<Vec<Vec<TextRun>>>,
    /// Checkbox state of a `ToDo` node.
    pub checked: Option<bool>,
}

impl Blob {
    pub fn new(id: impl Into<String>, kind: BlobKind, runs: Vec<TextRun>) -> Self {
        Self {
            id: id.into(),
            kind,
            runs,
            children: None,
            image: None,
            language: None,
            table_width: None,
            table_cells: None,
            checked: None,
        }
    }

    pub fn with_children(mut self, children: Vec<Blob>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn with_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.image = Some(path.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_table_width(mut self, width: usize) -> Self {
        self.table_width = Some(width);
        self
    }

    pub fn with_table_cells(mut self, cells: Vec<Vec<TextRun>>) -> Self {
        self.table_cells = Some(cells);
        self
    }

    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checked = Some(checked);
        self
    }

    /// Children as a slice; empty when the node has none.
    pub fn children(&self) -> &[Blob] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Image paths referenced anywhere in this subtree, in document order.
    pub fn image_paths(&self) -> Vec<&Path> {
        let mut paths = Vec::new();
        let mut stack = vec![self];
        while let Some(blob) = stack.pop() {
            if let Some(ref p) = blob.image {
                paths.push(p.as_path());
            }
            stack.extend(blob.children().iter().rev());
        }
        paths
    }

    /// Rebuild this subtree with every image path found in `moved` replaced.
    ///
    /// Nodes whose path is not in the map are carried over unchanged.
    pub fn relocate_images(self, moved: &HashMap<PathBuf, PathBuf>) -> Blob {
        map_post_order(self, &mut |blob| {
            let target = blob.image.as_ref().and_then(|old| moved.get(old)).cloned();
            match target {
                Some(new) => blob.with_image(new),
                None => blob,
            }
        })
    }
}

// Pages nest arbitrarily deep; the derived drop glue would recurse once per
// level.
impl Drop for Blob {
    fn drop(&mut self) {
        let mut pending = match self.children.take() {
            Some(children) => children,
            None => return,
        };
        while let Some(mut blob) = pending.pop() {
            if let Some(children) = blob.children.take() {
                pending.extend(children);
            }
        }
    }
}

/// Post-order rebuild of a tree without recursion.
///
/// `f` sees each node after its children have already been rebuilt.
fn map_post_order(root: Blob, f: &mut impl FnMut(Blob) -> Blob) -> Blob {
    struct Frame {
        node: Blob,
        pending: std::vec::IntoIter<Blob>,
        done: Option<Vec<Blob>>,
    }

    fn open(mut node: Blob) -> Frame {
        let children = node.children.take();
        let done = children.as_ref().map(|c| Vec::with_capacity(c.len()));
        Frame {
            node,
            pending: children.unwrap_or_default().into_iter(),
            done,
        }
    }

    let mut stack = vec![open(root)];
    while let Some(mut frame) = stack.pop() {
        if let Some(child) = frame.pending.next() {
            stack.push(frame);
            stack.push(open(child));
            continue;
        }
        let mut node = frame.node;
        node.children = frame.done;
        let node = f(node);
        match stack.last_mut() {
            Some(parent) => parent.done.get_or_insert_with(Vec::new).push(node),
            None => return node,
        }
    }
    unreachable!("the root frame returns before the stack empties")
}

// ── Properties ───────────────────────────────────────────────────────────

/// A flattened page property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Empty,
    Text(String),
    Bool(bool),
    Int(i64),
    Number(f64),
    List(Vec<String>),
}

impl PropertyValue {
    /// Whether the value carries anything worth printing.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Empty => false,
            Self::Text(s) => !s.is_empty(),
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Number(n) => *n != 0.0,
            Self::List(l) => !l.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item:?}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Property map that keeps the source's key order and unique keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    entries: Vec<(String, PropertyValue)>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value; an existing key keeps its position and gets the new value.
    pub fn insert(&mut self, key: impl Into<String>, value: PropertyValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entries sorted lexically by key.
    pub fn sorted(&self) -> Vec<(&str, &PropertyValue)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

impl FromIterator<(String, PropertyValue)> for Properties {
    fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
        let mut props = Properties::new();
        for (k, v) in iter {
            props.insert(k, v);
        }
        props
    }
}

// ── Document ─────────────────────────────────────────────────────────────

/// One exported unit: a source page with its parsed block tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub properties: Properties,
    pub blocks: Vec<Blob>,
    pub header: Option<Blob>,
    pub footer: Option<Blob>,
}

impl Document {
    pub fn new(id: impl Into<String>, properties: Properties, blocks: Vec<Blob>) -> Self {
        Self {
            id: id.into(),
            properties,
            blocks,
            header: None,
            footer: None,
        }
    }

    /// Same document with header and footer replaced.
    pub fn with_frame(self, header: Option<Blob>, footer: Option<Blob>) -> Self {
        Self {
            header,
            footer,
            ..self
        }
    }
}
