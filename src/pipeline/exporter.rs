//! Output stage: write each document as a Hugo page bundle.
//!
//! ```text
//! parent_dir/
//!   <post name>/
//!     images/       images moved out of the run's image cache
//!     index.md      header + blocks + footer
//! ```
//!
//! ## Destructive construction
//!
//! [`MarkdownExporter::new`] deletes `parent_dir` and everything below it
//! before recreating it empty. This happens once per exporter; exporting
//! documents afterwards never clears anything.
//!
//! ## Image ownership
//!
//! Image nodes arrive pointing into the run's temporary cache. Each file is
//! moved (not copied) into the post's `images/` directory and the node is
//! rebuilt with the new path before any text is rendered.

use crate::config::MarkdownExporterConfig;
use crate::error::{DocumentError, Notion2HugoError};
use crate::model::{Blob, Document};
use crate::pipeline::render::{render, render_optional, POST_IMAGES_DIR};
use futures::future::{BoxFuture, FutureExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the markdown file inside each post directory.
pub const POST_FILE_NAME: &str = "index.md";

static UNSAFE_PATH_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\-_.]").expect("valid regex"));

/// Output stage of the pipeline.
pub trait Exporter: Send + Sync {
    /// Write `document` and return the path of the written file.
    fn export(&self, document: Document) -> BoxFuture<'_, Result<PathBuf, DocumentError>>;
}

/// Drop every character outside `[A-Za-z0-9._-]`.
pub fn sanitize_path(name: &str) -> String {
    UNSAFE_PATH_CHARS.replace_all(name, "").into_owned()
}

/// Render a document: header, each block, footer, joined and trimmed.
pub fn assemble_markdown(document: &Document) -> Result<String, DocumentError> {
    let mut texts = Vec::with_capacity(document.blocks.len() + 2);
    texts.push(render_optional(document.header.as_ref(), 0)?);
    for blob in &document.blocks {
        texts.push(render(blob, 0)?);
    }
    texts.push(render_optional(document.footer.as_ref(), 0)?);
    Ok(texts.join("\n").trim().to_string())
}

/// Writes documents as `<parent_dir>/<post>/index.md` page bundles.
#[derive(Debug)]
pub struct MarkdownExporter {
    config: MarkdownExporterConfig,
}

impl MarkdownExporter {
    /// Create the exporter, **clearing `config.parent_dir`**.
    pub fn new(config: MarkdownExporterConfig) -> Result<Self, Notion2HugoError> {
        let parent = &config.parent_dir;
        info!("Clean up parent dir: {}", parent.display());

        let setup_failed = |source| Notion2HugoError::OutputSetupFailed {
            path: parent.clone(),
            source,
        };
        if parent.exists() {
            std::fs::remove_dir_all(parent).map_err(setup_failed)?;
        }
        std::fs::create_dir_all(parent).map_err(setup_failed)?;

        Ok(Self { config })
    }

    /// Directory name for a document: the configured property, or the id.
    fn post_dir_name(&self, document: &Document) -> Result<String, DocumentError> {
        let raw = match self.config.post_name_property_key {
            Some(ref key) => document
                .properties
                .get(key)
                .and_then(|v| v.as_text())
                .ok_or_else(|| DocumentError::MissingPostName { key: key.clone() })?,
            None => document.id.as_str(),
        };
        let name = sanitize_path(raw);
        if name.is_empty() {
            Ok(sanitize_path(&document.id))
        } else {
            Ok(name)
        }
    }

    async fn export_document(&self, document: Document) -> Result<PathBuf, DocumentError> {
        let post_dir = self.config.parent_dir.join(self.post_dir_name(&document)?);
        let images_dir = post_dir.join(POST_IMAGES_DIR);
        debug!("Creating output dir structure: {}", images_dir.display());
        tokio::fs::create_dir_all(&images_dir)
            .await
            .map_err(|e| output_error(&images_dir, e))?;

        let document = relocate_images(document, &images_dir).await?;
        let markdown = assemble_markdown(&document)?;

        let post_path = post_dir.join(POST_FILE_NAME);
        let tmp_path = post_path.with_extension("md.tmp");
        tokio::fs::write(&tmp_path, &markdown)
            .await
            .map_err(|e| output_error(&post_path, e))?;
        tokio::fs::rename(&tmp_path, &post_path)
            .await
            .map_err(|e| output_error(&post_path, e))?;

        info!("Export post id={} to path='{}'", document.id, post_path.display());
        Ok(post_path)
    }
}

impl Exporter for MarkdownExporter {
    fn export(&self, document: Document) -> BoxFuture<'_, Result<PathBuf, DocumentError>> {
        self.export_document(document).boxed()
    }
}

/// Move every image file referenced by `document` into `images_dir` and
/// return the document rebuilt with the new paths.
async fn relocate_images(document: Document, images_dir: &Path) -> Result<Document, DocumentError> {
    let mut sources: Vec<PathBuf> = Vec::new();
    let framed = document.header.iter().chain(&document.blocks).chain(&document.footer);
    for blob in framed {
        sources.extend(blob.image_paths().into_iter().map(Path::to_path_buf));
    }

    let mut moved: HashMap<PathBuf, PathBuf> = HashMap::new();
    for from in sources {
        if moved.contains_key(&from) {
            continue;
        }
        let file_name = from.file_name().ok_or_else(|| output_error(&from, not_a_file()))?;
        let to = images_dir.join(file_name);
        move_file(&from, &to)
            .await
            .map_err(|e| output_error(&from, e))?;
        debug!("Moved image {} → {}", from.display(), to.display());
        moved.insert(from, to);
    }

    if moved.is_empty() {
        return Ok(document);
    }
    let relocate = |blob: Blob| blob.relocate_images(&moved);
    Ok(Document {
        header: document.header.map(relocate),
        blocks: document.blocks.into_iter().map(relocate).collect(),
        footer: document.footer.map(relocate),
        ..document
    })
}

/// Rename, falling back to copy + delete when the rename cannot be done
/// (e.g. the cache lives on another file system).
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await
}

fn not_a_file() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name")
}

fn output_error(path: &Path, source: std::io::Error) -> DocumentError {
    DocumentError::Output {
        path: path.to_path_buf(),
        source,
    }
}
