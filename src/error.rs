//! Error types for the notion2hugo library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Notion2HugoError`] is **fatal**: the run cannot proceed at all
//!   (unreadable config, missing token, database listing failed, output
//!   directory unusable). Returned as `Err` from [`crate::runner::Runner`].
//!
//! * [`DocumentError`] is **document-scoped**: one page could not be parsed,
//!   rendered or written, but every other page is unaffected. The runner
//!   logs it, counts it, and moves on to the next document.

use crate::notion::SourceError;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the notion2hugo library.
#[derive(Debug, Error)]
pub enum Notion2HugoError {
    /// The configuration file could not be read or deserialised.
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(String),

    /// The configuration was read but a value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No integration token was supplied for the source.
    #[error("No Notion integration token configured.\nSet NOTION_TOKEN or pass --token <TOKEN>.")]
    MissingToken,

    /// Listing the pages of the database failed.
    #[error("Failed to list pages of database '{database_id}': {source}")]
    SourceUnavailable {
        database_id: String,
        #[source]
        source: SourceError,
    },

    /// The output parent directory could not be cleared or created.
    #[error("Failed to prepare output directory '{path}': {source}")]
    OutputSetupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure that aborts the processing of a single document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// A raw record did not match any recognised shape.
    #[error("Malformed source block '{id}' of type '{kind}': {detail}")]
    MalformedSourceShape {
        id: String,
        kind: String,
        detail: String,
    },

    /// An image could not be downloaded or is not an image.
    #[error("Failed to fetch resource '{locator}': {reason}")]
    ResourceFetchError { locator: String, reason: String },

    /// The renderer has no rule for this node kind.
    #[error("Unsupported node kind '{kind}' (node '{id}')")]
    UnsupportedNodeKind { kind: String, id: String },

    /// A property value did not match any recognised shape.
    #[error("Unsupported shape for property '{key}': {value}")]
    UnsupportedPropertyShape { key: String, value: String },

    /// A node reached the renderer without a field its kind requires.
    #[error("Node '{id}' of kind '{kind}' is missing required field '{field}'")]
    IncompleteRequiredField {
        kind: String,
        id: String,
        field: &'static str,
    },

    /// The configured post-name property is absent or not a string.
    #[error("Property '{key}' is missing or not a string; cannot name the output directory")]
    MissingPostName { key: String },

    /// Retrieving child blocks from the source failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Writing the exported document failed.
    #[error("Failed to write '{path}': {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A [`DocumentError`] tagged with the id of the document it aborted.
#[derive(Debug, Error)]
#[error("Document '{id}': {error}")]
pub struct DocumentFailure {
    pub id: String,
    #[source]
    pub error: DocumentError,
}

impl DocumentFailure {
    pub fn new(id: impl Into<String>, error: DocumentError) -> Self {
        Self {
            id: id.into(),
            error,
        }
    }
}
