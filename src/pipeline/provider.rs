//! Source stage: turn database pages into [`Document`]s.
//!
//! [`NotionProvider`] lists the configured database once, then resolves up
//! to `concurrency` pages at the same time. Each page is fetched, parsed and
//! handed downstream as soon as it is ready, so documents arrive in
//! completion order rather than listing order.
//!
//! A failure while listing the database is fatal for the run. A failure
//! while building one page is yielded as a [`DocumentFailure`] in that page's
//! slot and never disturbs its siblings.

use crate::config::NotionProviderConfig;
use crate::error::{DocumentError, DocumentFailure, Notion2HugoError};
use crate::model::Document;
use crate::notion::{BlockSource, NotionClient, RawPage};
use crate::pipeline::parse::{parse_blocks, parse_properties};
use crate::pipeline::tree::{resolve_page_tree, ImageCache};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};

/// Documents in completion order; failed documents carry their error.
pub type DocumentStream<'a> = BoxStream<'a, Result<Document, DocumentFailure>>;

/// Source stage of the pipeline.
pub trait Provider: Send + Sync {
    /// Start producing documents.
    ///
    /// Returns `Err` only when nothing at all can be produced.
    fn documents(&self) -> BoxFuture<'_, Result<DocumentStream<'_>, Notion2HugoError>>;
}

/// Provider backed by a Notion database.
///
/// Each page is resolved on its own tokio task, so page fetches make progress
/// on every runtime worker while the runner consumes finished documents.
pub struct NotionProvider<S = NotionClient> {
    inner: Arc<ProviderInner<S>>,
}

struct ProviderInner<S> {
    source: S,
    config: NotionProviderConfig,
    cache: ImageCache,
}

impl<S: BlockSource + 'static> NotionProvider<S> {
    /// Create a provider with a fresh run-scoped image cache.
    pub fn new(source: S, config: NotionProviderConfig) -> Result<Self, Notion2HugoError> {
        let cache = ImageCache::new()
            .map_err(|e| Notion2HugoError::Internal(format!("cannot create image cache: {e}")))?;
        debug!("Image cache at {}", cache.path().display());
        Ok(Self {
            inner: Arc::new(ProviderInner {
                source,
                config,
                cache,
            }),
        })
    }

    pub fn image_cache(&self) -> &ImageCache {
        &self.inner.cache
    }

    /// Fetch, resolve and parse one page on the current task.
    pub async fn fetch_document(&self, page: RawPage) -> Result<Document, DocumentFailure> {
        self.inner.fetch_document(page).await
    }

    async fn stream_documents(&self) -> Result<DocumentStream<'_>, Notion2HugoError> {
        let config = &self.inner.config;
        let database_id = &config.database_id;
        info!("Querying database {}", database_id);
        let pages = self
            .inner
            .source
            .query_pages(database_id, config.filter.as_ref())
            .await
            .map_err(|source| Notion2HugoError::SourceUnavailable {
                database_id: database_id.clone(),
                source,
            })?;
        info!("Database {} returned {} pages", database_id, pages.len());

        let inner = Arc::clone(&self.inner);
        let documents = stream::iter(pages)
            .map(move |page| {
                let inner = Arc::clone(&inner);
                let task = tokio::spawn(async move { inner.fetch_document(page).await });
                async move {
                    match task.await {
                        Ok(result) => result,
                        Err(e) => match e.try_into_panic() {
                            // A panicking page fetch surfaces exactly as it would inline.
                            Ok(panic) => std::panic::resume_unwind(panic),
                            // Only a runtime shutdown cancels the task, and that
                            // drops this future first.
                            Err(e) => unreachable!("page task cancelled: {e}"),
                        },
                    }
                }
            })
            .buffer_unordered(config.concurrency.max(1));
        Ok(documents.boxed())
    }
}

impl<S: BlockSource> ProviderInner<S> {
    async fn fetch_document(&self, page: RawPage) -> Result<Document, DocumentFailure> {
        self.build_document(&page)
            .await
            .map_err(|e| DocumentFailure::new(page.id.clone(), e))
    }

    async fn build_document(&self, page: &RawPage) -> Result<Document, DocumentError> {
        let properties = parse_properties(&page.properties)?;
        let tree =
            resolve_page_tree(&self.source, &page.id, &self.cache, self.config.concurrency).await?;
        let blocks = parse_blocks(tree.blocks, &tree.images)?;
        debug!("Parsed page {} ({} top-level blocks)", page.id, blocks.len());
        Ok(Document::new(page.id.clone(), properties, blocks))
    }
}

impl<S: BlockSource + 'static> Provider for NotionProvider<S> {
    fn documents(&self) -> BoxFuture<'_, Result<DocumentStream<'_>, Notion2HugoError>> {
        self.stream_documents().boxed()
    }
}
