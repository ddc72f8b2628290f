//! Configuration types for a notion2hugo run.
//!
//! A run is described by one [`RunnerConfig`]: which provider, formatter and
//! exporter to build (each selected by its `kind` tag) plus their settings.
//! It is loaded from a TOML file with an environment overlay:
//!
//! ```toml
//! [provider]
//! kind = "notion"
//! database_id = "0123456789abcdef"
//! filter = { property = "Status", status = { does_not_equal = "Not Started" } }
//!
//! [formatter]
//! kind = "hugo"
//!
//! [exporter]
//! kind = "markdown"
//! parent_dir = "content/posts"
//! post_name_property_key = "Name"
//! ```
//!
//! Any key can be overridden with `NOTION2HUGO__<SECTION>__<KEY>`, e.g.
//! `NOTION2HUGO__EXPORTER__PARENT_DIR=/tmp/out`.
//!
//! The integration token is never read from the file; supply it with
//! [`RunnerConfig::with_token`] (the CLI reads `NOTION_TOKEN` / `--token`).

use crate::error::Notion2HugoError;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

/// Prefix of environment variables that override file keys.
pub const ENV_PREFIX: &str = "NOTION2HUGO";

/// Default number of documents (and child listings) fetched at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

pub use crate::notion::client::DEFAULT_API_BASE;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Complete configuration of one run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    pub provider: ProviderConfig,
    pub formatter: FormatterConfig,
    pub exporter: ExporterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Provider variant, selected by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    Notion(NotionProviderConfig),
}

/// Formatter variant, selected by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormatterConfig {
    Hugo(HugoFormatterConfig),
}

/// Exporter variant, selected by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExporterConfig {
    Markdown(MarkdownExporterConfig),
}

/// Settings of the Notion database provider.
#[derive(Clone, Deserialize)]
pub struct NotionProviderConfig {
    /// Database whose pages are exported.
    pub database_id: String,

    /// Query filter, passed to the API as-is.
    #[serde(default)]
    pub filter: Option<Value>,

    /// Documents resolved at once; also bounds child listings per level.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Integration token. Never deserialised.
    #[serde(skip)]
    pub token: Option<String>,
}

impl NotionProviderConfig {
    pub fn new(database_id: impl Into<String>) -> Self {
        Self {
            database_id: database_id.into(),
            filter: None,
            concurrency: DEFAULT_CONCURRENCY,
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            token: None,
        }
    }
}

// Manual Debug so the token never reaches a log line.
impl fmt::Debug for NotionProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionProviderConfig")
            .field("database_id", &self.database_id)
            .field("filter", &self.filter)
            .field("concurrency", &self.concurrency)
            .field("api_base", &self.api_base)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Settings of the Hugo formatter (none yet).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HugoFormatterConfig {}

/// Settings of the markdown page-bundle exporter.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkdownExporterConfig {
    /// Output root. **Cleared** when the exporter is built.
    pub parent_dir: PathBuf,

    /// Property naming each post directory; the document id when unset.
    #[serde(default)]
    pub post_name_property_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RunnerConfig {
    /// Load from a TOML file plus the `NOTION2HUGO__` environment overlay,
    /// then validate.
    pub fn load(path: &Path) -> Result<Self, Notion2HugoError> {
        if !path.is_file() {
            return Err(Notion2HugoError::ConfigLoad(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Self::from_builder(
            Config::builder().add_source(File::from(path).format(FileFormat::Toml)),
        )
    }

    /// Parse TOML text (environment overlay included), then validate.
    pub fn from_toml_str(toml: &str) -> Result<Self, Notion2HugoError> {
        Self::from_builder(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, Notion2HugoError> {
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| Notion2HugoError::ConfigLoad(e.to_string()))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| Notion2HugoError::ConfigLoad(e.to_string()))?;
        config.validate()
    }

    /// Check required values and clamp the tunables.
    pub fn validate(mut self) -> Result<Self, Notion2HugoError> {
        match self.provider {
            ProviderConfig::Notion(ref mut notion) => {
                if notion.database_id.trim().is_empty() {
                    return Err(Notion2HugoError::InvalidConfig(
                        "provider.database_id must not be empty".into(),
                    ));
                }
                notion.concurrency = notion.concurrency.max(1);
                notion.request_timeout_secs = notion.request_timeout_secs.max(1);
            }
        }
        match self.exporter {
            ExporterConfig::Markdown(ref markdown) => {
                if markdown.parent_dir.as_os_str().is_empty() {
                    return Err(Notion2HugoError::InvalidConfig(
                        "exporter.parent_dir must not be empty".into(),
                    ));
                }
            }
        }
        Ok(self)
    }

    /// Set the provider's integration token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        match self.provider {
            ProviderConfig::Notion(ref mut notion) => notion.token = Some(token.into()),
        }
        self
    }

    /// Override the exporter's output root.
    pub fn with_parent_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        match self.exporter {
            ExporterConfig::Markdown(ref mut markdown) => markdown.parent_dir = dir.into(),
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[provider]
kind = "notion"
database_id = "db-123"
filter = { property = "Status", status = { does_not_equal = "Not Started" } }

[formatter]
kind = "hugo"

[exporter]
kind = "markdown"
parent_dir = "content/posts"
post_name_property_key = "Name"
"#;

    #[test]
    fn parses_full_config_with_defaults() {
        let config = RunnerConfig::from_toml_str(SAMPLE).unwrap();
        let ProviderConfig::Notion(notion) = &config.provider;
        assert_eq!(notion.database_id, "db-123");
        assert_eq!(notion.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(notion.api_base, DEFAULT_API_BASE);
        assert_eq!(notion.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert!(notion.token.is_none());
        let filter = notion.filter.as_ref().unwrap();
        assert_eq!(filter["property"], "Status");
        assert_eq!(filter["status"]["does_not_equal"], "Not Started");

        let ExporterConfig::Markdown(markdown) = &config.exporter;
        assert_eq!(markdown.parent_dir, PathBuf::from("content/posts"));
        assert_eq!(markdown.post_name_property_key.as_deref(), Some("Name"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notion2hugo.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = RunnerConfig::load(&path).unwrap();
        assert!(matches!(config.formatter, FormatterConfig::Hugo(_)));
    }

    #[test]
    fn missing_file_is_config_load_error() {
        let err = RunnerConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, Notion2HugoError::ConfigLoad(_)));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let toml = SAMPLE.replace("kind = \"hugo\"", "kind = \"jekyll\"");
        let err = RunnerConfig::from_toml_str(&toml).unwrap_err();
        assert!(matches!(err, Notion2HugoError::ConfigLoad(_)), "got: {err}");
    }

    #[test]
    fn empty_database_id_is_invalid() {
        let toml = SAMPLE.replace("database_id = \"db-123\"", "database_id = \"\"");
        let err = RunnerConfig::from_toml_str(&toml).unwrap_err();
        assert!(matches!(err, Notion2HugoError::InvalidConfig(_)));
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let toml = SAMPLE.replace("database_id = \"db-123\"", "database_id = \"db\"\nconcurrency = 0");
        let config = RunnerConfig::from_toml_str(&toml).unwrap();
        let ProviderConfig::Notion(notion) = &config.provider;
        assert_eq!(notion.concurrency, 1);
    }

    #[test]
    fn overrides_and_redacted_debug() {
        let config = RunnerConfig::from_toml_str(SAMPLE)
            .unwrap()
            .with_token("secret_abc")
            .with_parent_dir("/tmp/out");

        let ExporterConfig::Markdown(markdown) = &config.exporter;
        assert_eq!(markdown.parent_dir, PathBuf::from("/tmp/out"));

        let debug = format!("{config:?}");
        assert!(!debug.contains("secret_abc"), "token leaked: {debug}");
        assert!(debug.contains("<redacted>"));
    }
}
