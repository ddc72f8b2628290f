//! The run loop: provider → formatter → exporter, one document at a time.
//!
//! [`Runner`] is the single consumer of the provider's stream. Documents
//! arrive in completion order; each is formatted and exported before the
//! next one is pulled. A document-scoped failure is logged, counted and
//! skipped. Only provider start-up errors abort the run.

use crate::config::RunnerConfig;
use crate::error::{DocumentFailure, Notion2HugoError};
use crate::pipeline::exporter::Exporter;
use crate::pipeline::formatter::Formatter;
use crate::pipeline::provider::Provider;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::registry;
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome counts of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Documents written to disk.
    pub exported: usize,
    /// Documents skipped because of a document-scoped error.
    pub failed: usize,
}

pub struct Runner {
    provider: Box<dyn Provider>,
    formatter: Box<dyn Formatter>,
    exporter: Box<dyn Exporter>,
    progress: ProgressCallback,
}

impl Runner {
    /// Build all three stages from `config`.
    ///
    /// Building the markdown exporter clears its parent directory.
    pub fn new(config: &RunnerConfig) -> Result<Self, Notion2HugoError> {
        let provider = registry::build_provider(&config.provider)?;
        let formatter = registry::build_formatter(&config.formatter);
        let exporter = registry::build_exporter(&config.exporter)?;
        Ok(Self::from_parts(provider, formatter, exporter))
    }

    /// Assemble a runner from already-built stages.
    pub fn from_parts(
        provider: Box<dyn Provider>,
        formatter: Box<dyn Formatter>,
        exporter: Box<dyn Exporter>,
    ) -> Self {
        Self {
            provider,
            formatter,
            exporter,
            progress: Arc::new(NoopProgressCallback),
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    /// Drain the provider, exporting every document it yields.
    pub async fn run(&self) -> Result<RunStats, Notion2HugoError> {
        info!("Start processing...");
        let mut documents = self.provider.documents().await?;
        self.progress.on_run_start();

        let mut stats = RunStats::default();
        while let Some(next) = documents.next().await {
            let failure = match next {
                Ok(document) => {
                    let id = document.id.clone();
                    info!("Got document {}", id);
                    let formatted = self.formatter.format(document);
                    match self.exporter.export(formatted).await {
                        Ok(path) => {
                            stats.exported += 1;
                            self.progress.on_document_exported(&id, &path);
                            continue;
                        }
                        Err(error) => DocumentFailure::new(id, error),
                    }
                }
                Err(failure) => failure,
            };

            warn!("Skipping document {}: {}", failure.id, failure.error);
            stats.failed += 1;
            self.progress
                .on_document_failed(&failure.id, &failure.error.to_string());
        }

        info!(
            "Finished: {} exported, {} failed",
            stats.exported, stats.failed
        );
        self.progress.on_run_complete(&stats);
        Ok(stats)
    }
}
