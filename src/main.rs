//! Market state engine - main entry point
//!
//! This binary provides four subcommands:
//! - compute: Run the signal/state engine over a price CSV
//! - fetch: Download daily price history for the configured tickers
//! - snapshot: Write the latest state and a signal changelog
//! - validate: Check a rule configuration without computing anything

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "market-state")]
#[command(about = "Daily market regime engine: SMA signals and composite state classification", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute per-date signal and state records
    Compute {
        /// Input wide CSV with date + ticker columns
        #[arg(short, long)]
        input: String,

        /// Path to the rule configuration (YAML or JSON)
        #[arg(short, long)]
        config: Option<String>,

        /// Output NDJSON file
        #[arg(short, long, default_value = "data/canonical.ndjson")]
        out: String,

        /// SMA window override
        #[arg(short, long)]
        window: Option<usize>,

        /// Use the built-in v0.1 signal set instead of a config file
        #[arg(long)]
        legacy: bool,
    },

    /// Download daily price history for the configured tickers
    Fetch {
        /// Path to the rule configuration (YAML or JSON)
        #[arg(short, long)]
        config: Option<String>,

        /// Use the built-in v0.1 ticker universe
        #[arg(long)]
        legacy: bool,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD, default=today)
        #[arg(long)]
        end: Option<String>,

        /// Output CSV path
        #[arg(short, long, default_value = "data/prices.csv")]
        out: String,
    },

    /// Write the latest state snapshot and signal changelog
    Snapshot {
        /// Input wide CSV with date + ticker columns
        #[arg(short, long)]
        input: String,

        /// Path to the rule configuration (YAML or JSON)
        #[arg(short, long)]
        config: Option<String>,

        /// Use the built-in v0.1 signal set
        #[arg(long)]
        legacy: bool,

        /// Output directory for state.json and CHANGELOG.md
        #[arg(short, long, default_value = "outputs")]
        out_dir: String,
    },

    /// Validate a rule configuration
    Validate {
        /// Path to the rule configuration (YAML or JSON)
        #[arg(short, long)]
        config: String,
    },
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    // Create logs directory
    std::fs::create_dir_all("logs")?;

    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!("{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn", level);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Compute { .. } => "compute",
        Commands::Fetch { .. } => "fetch",
        Commands::Snapshot { .. } => "snapshot",
        Commands::Validate { .. } => "validate",
    };

    setup_logging(cli.verbose, command_name)?;

    match cli.command {
        Commands::Compute {
            input,
            config,
            out,
            window,
            legacy,
        } => commands::compute::run(input, config, out, window, legacy),

        Commands::Fetch {
            config,
            legacy,
            start,
            end,
            out,
        } => commands::fetch::run(config, legacy, start, end, out),

        Commands::Snapshot {
            input,
            config,
            legacy,
            out_dir,
        } => commands::snapshot::run(input, config, legacy, out_dir),

        Commands::Validate { config } => commands::validate::run(config),
    }
}
