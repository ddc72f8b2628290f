//! Stage registry: configuration variant → stage constructor.
//!
//! Each `*Config` enum names the implementation to build through its `kind`
//! tag. Adding an implementation means adding a variant and one match arm
//! here; the runner only ever sees the boxed trait objects.

use crate::config::{ExporterConfig, FormatterConfig, ProviderConfig};
use crate::error::Notion2HugoError;
use crate::notion::NotionClient;
use crate::pipeline::exporter::{Exporter, MarkdownExporter};
use crate::pipeline::formatter::{Formatter, HugoFormatter};
use crate::pipeline::provider::{NotionProvider, Provider};
use tracing::debug;

/// Build the source stage.
///
/// Fails with [`Notion2HugoError::MissingToken`] when the Notion variant has
/// no (or an empty) token.
pub fn build_provider(config: &ProviderConfig) -> Result<Box<dyn Provider>, Notion2HugoError> {
    match config {
        ProviderConfig::Notion(notion) => {
            let token = notion
                .token
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or(Notion2HugoError::MissingToken)?;
            let client = NotionClient::new(token, &notion.api_base, notion.request_timeout_secs)
                .map_err(|e| Notion2HugoError::Internal(e.to_string()))?;
            debug!("Built notion provider for database {}", notion.database_id);
            Ok(Box::new(NotionProvider::new(client, notion.clone())?))
        }
    }
}

/// Build the transform stage.
pub fn build_formatter(config: &FormatterConfig) -> Box<dyn Formatter> {
    match config {
        FormatterConfig::Hugo(hugo) => Box::new(HugoFormatter::new(hugo.clone())),
    }
}

/// Build the output stage. The markdown exporter clears its parent dir here.
pub fn build_exporter(config: &ExporterConfig) -> Result<Box<dyn Exporter>, Notion2HugoError> {
    match config {
        ExporterConfig::Markdown(markdown) => Ok(Box::new(MarkdownExporter::new(markdown.clone())?)),
    }
}
