//! CLI binary for notion2hugo.
//!
//! A thin shim over the library crate: loads the TOML config, applies the
//! command-line overrides, runs the pipeline and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use notion2hugo::{RunProgressCallback, RunStats, Runner, RunnerConfig};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner plus one log line per document. The page count is unknown up
/// front, so this stays a spinner with a running counter.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  {pos} exported  ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Querying");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl RunProgressCallback for CliProgressCallback {
    fn on_run_start(&self) {
        self.bar.set_prefix("Exporting");
    }

    fn on_document_exported(&self, id: &str, path: &Path) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            id,
            dim(&path.display().to_string())
        ));
        self.bar.inc(1);
    }

    fn on_document_failed(&self, id: &str, error: &str) {
        let msg = if error.chars().count() > 100 {
            let cut: String = error.chars().take(99).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {}  {}", red("✗"), id, red(&msg)));
    }

    fn on_run_complete(&self, _stats: &RunStats) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Export with the token from the environment
  NOTION_TOKEN=secret_... notion2hugo notion2hugo.toml

  # Write somewhere else than the configured parent_dir
  notion2hugo notion2hugo.toml --parent-dir /tmp/preview

  # Debug logging, no spinner
  notion2hugo -v --no-progress notion2hugo.toml

CONFIG FILE:
  [provider]
  kind = "notion"
  database_id = "<database id>"
  filter = { property = "Status", status = { does_not_equal = "Not Started" } }

  [formatter]
  kind = "hugo"

  [exporter]
  kind = "markdown"
  parent_dir = "content/posts"       # CLEARED at start of every run
  post_name_property_key = "Name"    # optional; page id otherwise

ENVIRONMENT VARIABLES:
  NOTION_TOKEN                  Notion integration token
  NOTION2HUGO__<SECTION>__<KEY> Override any config key
  RUST_LOG                      tracing filter (overrides -v / -q)
"#;

/// Export a Notion database to Hugo page bundles.
#[derive(Parser, Debug)]
#[command(
    name = "notion2hugo",
    version,
    about = "Export a Notion database to Hugo markdown page bundles",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the TOML configuration file.
    config: PathBuf,

    /// Notion integration token.
    #[arg(long, env = "NOTION_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Override `exporter.parent_dir` (the directory is cleared first).
    #[arg(long, env = "NOTION2HUGO_PARENT_DIR")]
    parent_dir: Option<PathBuf>,

    /// Disable the progress spinner.
    #[arg(long, env = "NOTION2HUGO_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "NOTION2HUGO_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "NOTION2HUGO_QUIET", conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = RunnerConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    if let Some(ref token) = cli.token {
        config = config.with_token(token.clone());
    }
    if let Some(ref dir) = cli.parent_dir {
        config = config.with_parent_dir(dir.clone());
    }

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error".to_string()
    } else if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Run ──────────────────────────────────────────────────────────────
    let mut runner = Runner::new(&config).context("Failed to set up the pipeline")?;
    if !cli.quiet && !cli.no_progress {
        runner = runner.with_progress(CliProgressCallback::new());
    }

    let stats = runner.run().await.context("Export failed")?;

    if !cli.quiet {
        eprintln!(
            "{} {} exported  {}",
            if stats.failed == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            bold(&stats.exported.to_string()),
            if stats.failed == 0 {
                String::new()
            } else {
                red(&format!("({} failed)", stats.failed))
            },
        );
    }

    if stats.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
