//! The retrieval collaborator: everything that talks to the content source.
//!
//! The rest of the crate only sees the [`BlockSource`] trait. [`NotionClient`]
//! implements it over HTTP; tests implement it over in-memory fixtures.
//! Every listing call drains pagination before returning, so callers always
//! receive complete child lists.

pub mod client;
pub mod raw;

pub use client::NotionClient;
pub use raw::{RawBlock, RawPage};

use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while talking to the source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport-level failure (DNS, TLS, connection reset).
    #[error("Request to '{url}' failed: {reason}")]
    Http { url: String, reason: String },

    /// The request exceeded the configured timeout.
    #[error("Request to '{url}' timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// The source answered with a non-success status.
    #[error("'{url}' returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("Failed to decode response from '{url}': {reason}")]
    Decode { url: String, reason: String },
}

/// A downloaded binary resource.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub bytes: Vec<u8>,
    /// Declared `Content-Type`, e.g. `image/png`.
    pub content_type: Option<String>,
}

/// Paginated access to pages, block children and binary resources.
pub trait BlockSource: Send + Sync {
    /// All pages of a database matching `filter`.
    fn query_pages<'a>(
        &'a self,
        database_id: &'a str,
        filter: Option<&'a Value>,
    ) -> BoxFuture<'a, Result<Vec<RawPage>, SourceError>>;

    /// All direct children of a block or page, in source order.
    fn list_children<'a>(
        &'a self,
        block_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<RawBlock>, SourceError>>;

    /// Download the resource behind `locator`.
    fn fetch_resource<'a>(
        &'a self,
        locator: &'a str,
    ) -> BoxFuture<'a, Result<FetchedResource, SourceError>>;
}
