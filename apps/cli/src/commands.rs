//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use clipdesk_checkpoint::CheckpointStore;
use clipdesk_core::{FinalizeResult, ProgressReporter};
use clipdesk_curation::CurationSession;
use clipdesk_report::{ReportDocument, TrimOptions, trim};
use clipdesk_shared::checkpoint_files::{
    FINAL_REPORT, FINAL_REPORT_TRIMMED, FULL_SCRAPED_ARTICLES, MISSING_ROUND1, MISSING_ROUND2,
    PREVIEW_ARTICLES, USER_FINAL_LIST,
};
use clipdesk_shared::{AppConfig, CurationSelection, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// clipdesk — curate scraped news into ordered, trimmed report documents.
#[derive(Parser)]
#[command(
    name = "clipdesk",
    version,
    about = "Resumable news curation: checkpointed selection, reconciliation, and report trimming.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Show the resumed stage and checkpoint presence for an instance.
    Status {
        /// Instance name from the config registry.
        instance: String,

        /// Partition date (YYYY-MM-DD, defaults to today).
        #[arg(long)]
        date: Option<String>,
    },

    /// List configured curation instances.
    Instances,

    /// Trim an assembled report to the checkpointed final selection.
    Trim {
        /// Instance name from the config registry.
        instance: String,

        /// JSON-serialized report document to trim.
        #[arg(long)]
        doc: PathBuf,

        /// Output path for the trimmed document (JSON).
        #[arg(short, long)]
        out: PathBuf,

        /// Partition date (YYYY-MM-DD, defaults to today).
        #[arg(long)]
        date: Option<String>,

        /// Body paragraphs kept per article (defaults from config).
        #[arg(long)]
        keep: Option<usize>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Build the default filter directives for a verbosity level, covering the
/// binary and every workspace library crate.
fn default_filter(verbose: u8) -> String {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    [
        "clipdesk",
        "clipdesk_shared",
        "clipdesk_checkpoint",
        "clipdesk_curation",
        "clipdesk_reconcile",
        "clipdesk_report",
        "clipdesk_core",
    ]
    .map(|target| format!("{target}={level}"))
    .join(",")
}

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(cli.verbose)));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Status { instance, date } => cmd_status(&instance, date.as_deref()).await,
        Command::Instances => cmd_instances().await,
        Command::Trim {
            instance,
            doc,
            out,
            date,
            keep,
        } => cmd_trim(&instance, &doc, &out, date.as_deref(), keep).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Session plumbing
// ---------------------------------------------------------------------------

fn open_session(
    config: &AppConfig,
    instance: &str,
    date: Option<&str>,
) -> Result<CurationSession> {
    let instance = config.find_instance(instance)?.clone();
    let root = config.resolved_checkpoint_root()?;
    let store = CheckpointStore::new(root, config.defaults.tz_offset_hours)?;

    let session = match date {
        Some(raw) => {
            let date: NaiveDate = raw
                .parse()
                .map_err(|e| eyre!("invalid date '{raw}': {e}"))?;
            CurationSession::for_date(instance, store, date)
        }
        None => CurationSession::new(instance, store),
    };
    Ok(session)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_status(instance: &str, date: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let mut session = open_session(&config, instance, date)?;
    let stage = session.resume()?;

    let base = session.instance().base_folder.clone();
    let date = session.date();
    let store = session.store();

    println!();
    println!("  Instance: {}", session.instance().name);
    println!("  Date:     {date}");
    println!("  Stage:    {stage}");
    println!("  Pool:     {} articles", session.pool().total_len());
    println!("  Selected: {} articles", session.selection().total_len());
    println!();
    println!("  Checkpoints in {}:", store.partition_dir(&base, date).display());
    for name in [
        PREVIEW_ARTICLES,
        USER_FINAL_LIST,
        FULL_SCRAPED_ARTICLES,
        MISSING_ROUND1,
        MISSING_ROUND2,
        FINAL_REPORT,
        FINAL_REPORT_TRIMMED,
    ] {
        let mark = if store.exists(&base, date, name) { "x" } else { " " };
        println!("    [{mark}] {name}");
    }
    println!();

    Ok(())
}

async fn cmd_instances() -> Result<()> {
    let config = load_config()?;

    if config.instances.is_empty() {
        println!("no instances configured — add [[instances]] entries to the config file");
        return Ok(());
    }

    println!();
    for instance in &config.instances {
        println!("  {}", instance.name);
        println!("    category:     {}", instance.category);
        println!("    base folder:  {}", instance.base_folder);
        println!("    report title: {}", instance.report_title);
        println!("    query:        {}", instance.query);
        println!();
    }

    Ok(())
}

async fn cmd_trim(
    instance: &str,
    doc_path: &PathBuf,
    out: &PathBuf,
    date: Option<&str>,
    keep: Option<usize>,
) -> Result<()> {
    let config = load_config()?;
    let session = open_session(&config, instance, date)?;

    let selection: CurationSelection = session
        .store()
        .load_json(&session.instance().base_folder, session.date(), USER_FINAL_LIST)?
        .ok_or_else(|| {
            eyre!(
                "no confirmed selection checkpointed for '{}' on {}",
                session.instance().name,
                session.date()
            )
        })?;

    let raw = std::fs::read_to_string(doc_path)
        .map_err(|e| eyre!("cannot read report document '{}': {e}", doc_path.display()))?;
    let document: ReportDocument = serde_json::from_str(&raw)
        .map_err(|e| eyre!("invalid report document '{}': {e}", doc_path.display()))?;

    let opts = TrimOptions {
        keep_body_paras: keep.unwrap_or(config.defaults.keep_body_paras),
        ..TrimOptions::default()
    };

    info!(
        instance = %session.instance().name,
        paragraphs = document.len(),
        selected = selection.total_len(),
        keep = opts.keep_body_paras,
        "trimming report"
    );

    let reporter = CliProgress::new();
    reporter.phase("Trimming report");
    let trimmed = trim(&document, &selection, &opts)?;
    reporter.finish();

    let json = serde_json::to_string_pretty(&trimmed)?;
    std::fs::write(out, json)
        .map_err(|e| eyre!("cannot write trimmed document '{}': {e}", out.display()))?;

    println!();
    println!("  Report trimmed!");
    println!("  Articles:   {}", selection.total_len());
    println!("  Paragraphs: {} -> {}", document.len(), trimmed.len());
    println!("  Output:     {}", out.display());
    println!();

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("config written to {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let rendered = toml::to_string_pretty(&config)?;
    println!("{rendered}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _result: &FinalizeResult) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::default_filter;

    #[test]
    fn verbosity_filter_covers_library_crates() {
        let filter = default_filter(1);
        for target in ["clipdesk_curation", "clipdesk_reconcile", "clipdesk_report"] {
            assert!(filter.contains(&format!("{target}=debug")), "{filter}");
        }
        assert!(default_filter(0).contains("clipdesk=info"));
        assert!(default_filter(3).contains("clipdesk_core=trace"));
    }
}
