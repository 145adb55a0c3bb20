//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use sheetdrop_core::{FileOutcome, Pipeline, ProgressReporter, RunSummary};
use sheetdrop_report::PdfReport;
use sheetdrop_shared::{
    AppConfig, FileIdentity, FileReference, PipelineSettings, config_file_path, init_config,
    load_config, locate_config,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// sheetdrop: turn new spreadsheets in a shared folder into summary reports.
#[derive(Parser)]
#[command(
    name = "sheetdrop",
    version,
    about = "Ingest new spreadsheets from a shared folder and emit one PDF summary per file.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to use instead of ./sheetdrop.toml or ~/.sheetdrop/sheetdrop.toml.
    #[arg(long, env = "SHEETDROP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Without a subcommand, one ingestion pass is run.
    #[command(subcommand)]
    pub command: Option<Command>,
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
    /// Run one ingestion pass over the folder (the default).
    Run,

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
    /// Write a config file with defaults.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sheetdrop=info",
        1 => "sheetdrop=debug",
        _ => "sheetdrop=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let explicit = cli.config.as_deref();
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => cmd_run(explicit).await,
        Command::Config { action } => match action {
            ConfigAction::Init { force } => cmd_config_init(explicit, force),
            ConfigAction::Show => cmd_config_show(explicit),
        },
    }
}

fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().map_err(|e| eyre!("cannot determine working directory: {e}"))
}

async fn cmd_run(explicit: Option<&Path>) -> Result<()> {
    let cwd = current_dir()?;
    let config = load_config(explicit, &cwd)?;
    let settings = PipelineSettings::from_config(&config, &cwd)?;

    info!(
        folder = %settings.folder_url,
        processed_log = %settings.processed_log.display(),
        "starting ingestion"
    );

    let emitter = PdfReport::new(settings.report.max_columns_per_table);
    let pipeline = Pipeline::new(settings, emitter)?;

    let reporter = CliProgress::new();
    let summary = pipeline.run(&reporter).await?;

    print_summary(&summary);

    if summary.is_success() {
        Ok(())
    } else {
        Err(eyre!(
            "{} of {} file(s) failed; they will be retried on the next run",
            summary.failed(),
            summary.discovered
        ))
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("  Run:        {}", summary.run_id);
    println!("  Discovered: {}", summary.discovered);
    println!("  Committed:  {}", summary.committed());
    println!("  Skipped:    {}", summary.skipped());
    println!("  Failed:     {}", summary.failed());
    println!("  Time:       {:.1}s", summary.elapsed.as_secs_f64());

    for (identity, outcome) in &summary.outcomes {
        match outcome {
            FileOutcome::Committed { report } => {
                println!("    + {identity} -> {}", report.display());
            }
            FileOutcome::Failed { stage, error } => {
                println!("    ! {identity} ({stage}): {error}");
            }
            FileOutcome::SkippedAlreadyProcessed => {}
        }
    }
    println!();
}

fn cmd_config_init(explicit: Option<&Path>, force: bool) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };
    if path.exists() && !force {
        return Err(eyre!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }

    let path = init_config(&path)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(explicit: Option<&Path>) -> Result<()> {
    let cwd = current_dir()?;
    match locate_config(explicit, &cwd)? {
        Some(path) => println!("# {}", path.display()),
        None => println!("# no config file found, showing defaults"),
    }
    let config: AppConfig = load_config(explicit, &cwd)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
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
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn file_started(&self, reference: &FileReference, current: usize, total: usize) {
        let label = reference.name.as_deref().unwrap_or(reference.identity.as_str());
        self.spinner.set_message(format!("[{current}/{total}] {label}"));
    }

    fn file_finished(&self, identity: &FileIdentity, outcome: &FileOutcome) {
        if let FileOutcome::Failed { stage, error } = outcome {
            self.spinner
                .println(format!("  failed {identity} while {stage}: {error}"));
        }
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}
