//! # notion2hugo
//!
//! Export the pages of a Notion database as Hugo markdown page bundles.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Notion database
//!  │
//!  ├─ 1. Provider   list pages, resolve each block tree, download images
//!  ├─ 2. Parse      raw blocks → typed Blob tree, flatten page properties
//!  ├─ 3. Formatter  Hugo front-matter header
//!  ├─ 4. Render     Blob tree → markdown text
//!  └─ 5. Exporter   <parent_dir>/<post>/index.md + images/
//! ```
//!
//! Pages are resolved concurrently and handed to a single consumer loop in
//! completion order. A page that fails (unknown block type, broken image,
//! unwritable output) is logged and skipped; the rest of the run continues.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use notion2hugo::{Runner, RunnerConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RunnerConfig::load(Path::new("notion2hugo.toml"))?
//!         .with_token(std::env::var("NOTION_TOKEN")?);
//!     let stats = Runner::new(&config)?.run().await?;
//!     eprintln!("{} exported, {} failed", stats.exported, stats.failed);
//!     Ok(())
//! }
//! ```
//!
//! **Note:** building the markdown exporter deletes and recreates its
//! `parent_dir`.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `notion2hugo` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod model;
pub mod notion;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod runner;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ExporterConfig, FormatterConfig, HugoFormatterConfig, LoggingConfig, MarkdownExporterConfig,
    NotionProviderConfig, ProviderConfig, RunnerConfig,
};
pub use error::{DocumentError, DocumentFailure, Notion2HugoError};
pub use model::{Blob, BlobKind, Document, Properties, PropertyValue, TextRun};
pub use notion::{BlockSource, FetchedResource, NotionClient, SourceError};
pub use pipeline::exporter::{sanitize_path, Exporter, MarkdownExporter};
pub use pipeline::formatter::{Formatter, HugoFormatter};
pub use pipeline::provider::{DocumentStream, NotionProvider, Provider};
pub use progress::{NoopProgressCallback, ProgressCallback, RunProgressCallback};
pub use runner::{RunStats, Runner};
