// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Three subcommands:
// - serve:          HTTP dashboard + hourly scheduler + progress stream
// - check:          one manual run for a dataset, results on stdout
// - export-errors:  the "errors only" CSV for a dataset
//
// Shared options (data directory, timeouts, catalog URLs, ...) live in
// GlobalArgs and can also come from environment variables.
// =============================================================================

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config;
use crate::model::Dataset;

#[derive(Parser, Debug)]
#[command(
    name = "link-warden",
    version,
    about = "Keeps an eye on published e-form and service links",
    long_about = "link-warden checks every link in the published e-form and service catalogs, \
                  records which ones are broken and since when, and serves the results."
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory holding snapshots and CSV exports
    #[arg(long, global = true, env = "LINK_WARDEN_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Links probed at the same time (1 = one after another)
    #[arg(long, global = true, default_value_t = config::DEFAULT_WORKERS)]
    pub workers: usize,

    /// Per-request timeout in seconds
    #[arg(long, global = true, default_value_t = config::DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Append a diagnostic row per probe to this CSV file
    #[arg(long, global = true, env = "LINK_WARDEN_AUDIT_LOG")]
    pub audit_log: Option<PathBuf>,

    /// Catalog endpoint for the e-forms dataset
    #[arg(long, global = true, env = "LINK_WARDEN_EFORMS_URL", default_value = config::EFORMS_CATALOG_URL)]
    pub eforms_url: String,

    /// Catalog endpoint for the services dataset
    #[arg(long, global = true, env = "LINK_WARDEN_SERVICES_URL", default_value = config::SERVICES_CATALOG_URL)]
    pub services_url: String,

    /// Minimum log level; overrides RUST_LOG when given (info if neither is set)
    #[arg(long, global = true)]
    pub log_level: Option<log::LevelFilter>,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    Plain,
    /// One JSON object per line
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the dashboard and check both datasets every hour
    ///
    /// Example: link-warden serve --port 8080
    Serve {
        /// Port to listen on
        #[arg(long, env = "PORT", default_value_t = config::DEFAULT_PORT)]
        port: u16,

        /// Don't start the hourly check loop
        #[arg(long)]
        no_scheduler: bool,

        /// Ping this URL every 10 minutes to keep the host awake
        #[arg(long, env = "SELF_URL")]
        self_url: Option<String>,
    },

    /// Check one dataset now and print the results
    ///
    /// Example: link-warden check eforms --json
    Check {
        /// eforms or services
        dataset: Dataset,

        /// Output results in JSON format instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Write the non-OK rows of a dataset as CSV
    ///
    /// Example: link-warden export-errors services --output errors.csv
    ExportErrors {
        /// eforms or services
        dataset: Dataset,

        /// Output file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}
