//! Block-tree resolution: fetch a page's complete raw tree and its images.
//!
//! ## Level-by-level fan-out
//!
//! The source only returns one level of children per call. Resolution walks
//! the tree breadth-first with an explicit frontier instead of recursing:
//! every block on the current level that declares children is listed
//! concurrently (up to `concurrency` requests in flight), the results become
//! the next frontier, and the loop stops when a level has no more parents.
//! A parent is only reassembled once all of its children are in hand, so the
//! parser never sees a partial child list.
//!
//! ## Image side channel
//!
//! Image blocks reference a remote file. Each one is downloaded into the
//! run-wide [`ImageCache`] under `<sha1(page id)>/<sha1(locator)>.<subtype>`.
//! Every document owns its own subdirectory. The cache holds the files until
//! the exporter moves them into the post's `images/` directory; whatever is
//! left when the cache is dropped is deleted with it.

use crate::error::DocumentError;
use crate::notion::{BlockSource, RawBlock};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Run-scoped directory holding downloaded images until export.
#[derive(Debug)]
pub struct ImageCache {
    dir: TempDir,
}

impl ImageCache {
    pub fn new() -> std::io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("notion2hugo-images-")
            .tempdir()?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Cache file name for a locator and image subtype.
    pub fn file_name(locator: &str, subtype: &str) -> String {
        format!("{}.{}", sha1_smol::Sha1::from(locator).digest(), subtype)
    }

    /// Cache subdirectory owning one document's downloads.
    ///
    /// Named after the document id's digest, so two documents that embed the
    /// same locator never share a file.
    pub fn document_dir_name(document_id: &str) -> String {
        sha1_smol::Sha1::from(document_id).digest().to_string()
    }

    /// Download `locator` on behalf of `document_id` and return the cached
    /// path.
    ///
    /// Within one document the same locator always maps to the same file;
    /// downloading it twice rewrites identical bytes.
    pub async fn fetch<S: BlockSource + ?Sized>(
        &self,
        source: &S,
        document_id: &str,
        locator: &str,
    ) -> Result<PathBuf, DocumentError> {
        let fetch_error = |reason: String| DocumentError::ResourceFetchError {
            locator: locator.to_string(),
            reason,
        };

        let resource = source
            .fetch_resource(locator)
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let subtype = image_subtype(resource.content_type.as_deref()).ok_or_else(|| {
            fetch_error(format!(
                "not an image (content type: {})",
                resource.content_type.as_deref().unwrap_or("none")
            ))
        })?;

        let dir = self.path().join(Self::document_dir_name(document_id));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| fetch_error(format!("failed to create cache dir: {e}")))?;

        let path = dir.join(Self::file_name(locator, &subtype));
        tokio::fs::write(&path, &resource.bytes)
            .await
            .map_err(|e| fetch_error(format!("failed to write cache file: {e}")))?;

        debug!("Cached image {} → {}", locator, path.display());
        Ok(path)
    }
}

/// Image subtype of a content type, usable as a file extension.
///
/// `image/png` → `png`, `image/svg+xml; charset=utf-8` → `svg`.
/// Anything that is not `image/*` yields `None`.
pub fn image_subtype(content_type: Option<&str>) -> Option<String> {
    let essence = content_type?.split(';').next()?.trim().to_ascii_lowercase();
    let subtype = essence.strip_prefix("image/")?;
    let subtype = subtype.split('+').next()?;
    if subtype.is_empty() {
        None
    } else {
        Some(subtype.to_string())
    }
}

/// Remote locator of an image block payload.
///
/// Hosted files live under `file.url`, external ones under `external.url`;
/// `type` says which.
pub fn image_locator(payload: &Value) -> Option<&str> {
    let source_type = payload.get("type")?.as_str()?;
    payload.get(source_type)?.get("url")?.as_str()
}

/// A page's complete raw block tree plus its cached images.
#[derive(Debug, Default)]
pub struct ResolvedTree {
    /// Top-level blocks with every `children` list filled in.
    pub blocks: Vec<RawBlock>,
    /// Cached image file per image block id.
    pub images: HashMap<String, PathBuf>,
}

/// Fetch the full block tree under `page_id`, then download its images.
pub async fn resolve_page_tree<S: BlockSource + ?Sized>(
    source: &S,
    page_id: &str,
    cache: &ImageCache,
    concurrency: usize,
) -> Result<ResolvedTree, DocumentError> {
    let concurrency = concurrency.max(1);

    // Flat arena; `links[i]` holds the arena indices of block i's children.
    // Children are always appended after their parent.
    let mut arena: Vec<RawBlock> = Vec::new();
    let mut links: Vec<Vec<usize>> = Vec::new();

    let top = source.list_children(page_id).await?;
    let roots: Vec<usize> = (0..top.len()).collect();
    for block in top {
        arena.push(block);
        links.push(Vec::new());
    }

    let mut frontier: Vec<usize> = roots
        .iter()
        .copied()
        .filter(|&i| arena[i].has_children)
        .collect();
    let mut depth = 1;

    while !frontier.is_empty() {
        debug!(
            "Page {}: listing children of {} blocks at depth {}",
            page_id,
            frontier.len(),
            depth
        );
        let ids: Vec<String> = frontier.iter().map(|&i| arena[i].id.clone()).collect();
        let fetched: Vec<Vec<RawBlock>> = stream::iter(ids)
            .map(|id: String| async move { source.list_children(&id).await })
            .buffered(concurrency)
            .try_collect()
            .await?;

        let mut next = Vec::new();
        for (parent, children) in frontier.into_iter().zip(fetched) {
            for child in children {
                let idx = arena.len();
                if child.has_children {
                    next.push(idx);
                }
                arena.push(child);
                links.push(Vec::new());
                links[parent].push(idx);
            }
        }
        frontier = next;
        depth += 1;
    }

    let images = fetch_images(source, page_id, &arena, cache, concurrency).await?;

    // Reassemble bottom-up: walking indices in reverse finishes every child
    // before its parent is visited.
    let mut slots: Vec<Option<RawBlock>> = arena.into_iter().map(Some).collect();
    for idx in (0..slots.len()).rev() {
        let declares_children = slots[idx].as_ref().is_some_and(|b| b.has_children);
        if !declares_children {
            continue;
        }
        let children: Vec<RawBlock> = links[idx]
            .iter()
            .filter_map(|&c| slots[c].take())
            .collect();
        if let Some(block) = slots[idx].as_mut() {
            block.children = Some(children);
        }
    }

    let blocks = roots.iter().filter_map(|&r| slots[r].take()).collect();
    Ok(ResolvedTree { blocks, images })
}

async fn fetch_images<S: BlockSource + ?Sized>(
    source: &S,
    page_id: &str,
    arena: &[RawBlock],
    cache: &ImageCache,
    concurrency: usize,
) -> Result<HashMap<String, PathBuf>, DocumentError> {
    let mut wanted = Vec::new();
    for block in arena.iter().filter(|b| b.kind == "image") {
        let locator =
            image_locator(&block.payload).ok_or_else(|| DocumentError::MalformedSourceShape {
                id: block.id.clone(),
                kind: block.kind.clone(),
                detail: "image payload has no file locator".to_string(),
            })?;
        wanted.push((block.id.clone(), locator.to_string()));
    }

    stream::iter(wanted)
        .map(|(id, locator): (String, String)| async move {
            let path = cache.fetch(source, page_id, &locator).await?;
            Ok::<_, DocumentError>((id, path))
        })
        .buffered(concurrency)
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subtype_from_content_type() {
        assert_eq!(image_subtype(Some("image/png")).as_deref(), Some("png"));
        assert_eq!(
            image_subtype(Some("image/svg+xml; charset=utf-8")).as_deref(),
            Some("svg")
        );
        assert_eq!(image_subtype(Some("IMAGE/JPEG")).as_deref(), Some("jpeg"));
        assert_eq!(image_subtype(Some("text/html")), None);
        assert_eq!(image_subtype(Some("image/")), None);
        assert_eq!(image_subtype(None), None);
    }

    #[test]
    fn locator_follows_payload_type() {
        let hosted = json!({ "type": "file", "file": { "url": "https://s3/x.png" }, "caption": [] });
        let external = json!({ "type": "external", "external": { "url": "https://cdn/y.jpg" } });
        assert_eq!(image_locator(&hosted), Some("https://s3/x.png"));
        assert_eq!(image_locator(&external), Some("https://cdn/y.jpg"));
        assert_eq!(image_locator(&json!({ "caption": [] })), None);
    }

    #[test]
    fn cache_names_are_stable_per_locator() {
        let a = ImageCache::file_name("https://host/a.png?sig=1", "png");
        let b = ImageCache::file_name("https://host/a.png?sig=1", "png");
        let c = ImageCache::file_name("https://host/b.png", "png");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.ends_with(".png"));
        assert_eq!(a.len(), 40 + ".png".len());
    }

    #[test]
    fn each_document_owns_a_cache_subdirectory() {
        let a = ImageCache::document_dir_name("page-a");
        let b = ImageCache::document_dir_name("page-b");
        assert_eq!(a, ImageCache::document_dir_name("page-a"));
        assert_ne!(a, b);
        assert_eq!(a.len(), 40);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
