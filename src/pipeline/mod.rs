//! Pipeline stages for Notion-to-Hugo export.
//!
//! ## Data Flow
//!
//! ```text
//! provider ─────────────────────────────────▶ formatter ──▶ exporter
//!   tree  (fetch blocks + images)               (header)      (index.md + images/)
//!   parse (raw blocks → Blob tree)                              render
//! ```
//!
//! 1. [`tree`]: resolve a page's full block tree level by level and
//!    download its images into the run's cache
//! 2. [`parse`]: turn raw block records into typed [`crate::model::Blob`]s
//!    and flatten page properties
//! 3. [`provider`]: stream finished documents in completion order
//! 4. [`formatter`]: attach the Hugo front-matter header
//! 5. [`render`]: project a `Blob` tree to markdown text
//! 6. [`exporter`]: move images and write the page bundle
//!
//! `tree`, `provider` and `exporter` do I/O; `parse`, `render` and
//! `formatter` are pure.

pub mod exporter;
pub mod formatter;
pub mod parse;
pub mod provider;
pub mod render;
pub mod tree;
