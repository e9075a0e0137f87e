// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging and validate settings
// 3. Build the run coordinator (catalog source + prober + store + progress)
// 4. Dispatch to the appropriate subcommand handler
// 5. Exit with proper code (0 = success, 1 = broken links, 2 = error)
// =============================================================================

// Module declarations - tells Rust about our other source files
mod catalog;       // src/catalog/ - upstream catalog download + normalization
mod checker;       // src/checker/ - probing a single link
mod cli;           // src/cli.rs - command-line parsing
mod config;        // src/config.rs - settings and constants
mod error;         // src/error.rs - typed errors
mod history;       // src/history/ - first-broken continuity + persistence
mod logging;       // src/logging.rs - env_logger setup
mod model;         // src/model.rs - shared data types
mod progress;      // src/progress.rs - run progress broadcast
mod run;           // src/run/ - run coordinator + single-flight guard
mod scheduler;     // src/scheduler.rs - hourly refresh + self-pinger
mod server;        // src/server/ - dashboard, downloads, progress stream

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::sync::Arc;

use catalog::HttpCatalog;
use checker::{AuditLog, HttpProber, LinkStatus};
use cli::{Cli, Commands};
use config::Settings;
use error::RunError;
use history::SnapshotStore;
use model::{CheckResult, Dataset};
use progress::ProgressChannel;
use run::{Coordinator, Trigger};

#[tokio::main]
async fn main() {
    // Run our application logic and capture the exit code
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Returns:
//   Ok(0) = no broken links
//   Ok(1) = broken links found
//   Ok(2) = run could not happen (e.g. another check in progress)
//   Err = unexpected error
async fn run() -> Result<i32> {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.global.log_level, cli.global.log_format) {
        eprintln!("Warning: could not initialise logging: {}", e);
    }

    let settings = Settings::from_args(&cli.global)?;
    let store = SnapshotStore::new(&settings.data_dir);

    match cli.command {
        Commands::Serve {
            port,
            no_scheduler,
            self_url,
        } => {
            let coordinator = Arc::new(build_coordinator(&settings, store)?);
            handle_serve(coordinator, port, no_scheduler, self_url).await
        }
        Commands::Check { dataset, json } => {
            let coordinator = build_coordinator(&settings, store)?;
            handle_check(&coordinator, dataset, json).await
        }
        Commands::ExportErrors { dataset, output } => {
            handle_export_errors(&store, dataset, output.as_deref())
        }
    }
}

// Wires the real catalog source, prober and store together
fn build_coordinator(settings: &Settings, store: SnapshotStore) -> Result<Coordinator> {
    let catalog = HttpCatalog::new(settings.timeout, settings.catalog_urls.clone())
        .context("Failed to create catalog HTTP client")?;

    let mut prober =
        HttpProber::new(settings.timeout).context("Failed to create probing HTTP client")?;
    if let Some(path) = &settings.audit_log {
        let audit = AuditLog::new(path);
        log::info!("Writing probe audit log to {}", audit.path().display());
        prober = prober.with_audit_log(Arc::new(audit));
    }

    Ok(Coordinator::new(
        Arc::new(catalog),
        Arc::new(prober),
        store,
        ProgressChannel::default(),
    )
    .with_workers(settings.workers))
}

// Handles the 'serve' subcommand
async fn handle_serve(
    coordinator: Arc<Coordinator>,
    port: u16,
    no_scheduler: bool,
    self_url: Option<String>,
) -> Result<i32> {
    if no_scheduler {
        log::info!("Scheduler disabled");
    } else {
        tokio::spawn(scheduler::auto_refresh(
            Arc::clone(&coordinator),
            config::AUTO_REFRESH_INTERVAL,
        ));
    }

    match self_url {
        Some(url) => {
            tokio::spawn(scheduler::self_pinger(url));
        }
        None => log::info!("No SELF_URL set, self-pinger disabled"),
    }

    server::serve(port, server::AppState { coordinator }).await?;
    Ok(0)
}

// Handles the 'check' subcommand
async fn handle_check(coordinator: &Coordinator, dataset: Dataset, json: bool) -> Result<i32> {
    println!("🔍 Checking {} links...", dataset);

    let snapshot = match coordinator.run(dataset, Trigger::Manual).await {
        Ok(snapshot) => snapshot,
        Err(RunError::AlreadyRunning) => {
            eprintln!("⚠️  Another check is in progress");
            return Ok(2);
        }
        Err(e) => return Err(e.into()),
    };

    print_results(&snapshot.results, json)?;

    let broken_count = snapshot.results.iter().filter(|r| !r.status.is_ok()).count();
    if broken_count > 0 {
        Ok(1)
    } else {
        Ok(0)
    }
}

// Handles the 'export-errors' subcommand
fn handle_export_errors(
    store: &SnapshotStore,
    dataset: Dataset,
    output: Option<&std::path::Path>,
) -> Result<i32> {
    let csv = store.errors_csv(dataset)?;
    match output {
        Some(path) => {
            std::fs::write(path, &csv)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote errors for {} to {}", dataset, path.display());
        }
        None => std::io::stdout().write_all(&csv)?,
    }
    Ok(0)
}

// Prints the results either as a table or JSON
fn print_results(results: &[CheckResult], json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(results)?;
        println!("{}", json_output);
    } else {
        print_table(results);
    }
    Ok(())
}

// Prints results as a human-readable table in the terminal
fn print_table(results: &[CheckResult]) {
    println!("{:<60} {:<40} {:<20}", "URL", "STATUS", "BROKEN SINCE");
    println!("{}", "=".repeat(120));

    for result in results {
        // Truncate URL if too long for display
        let url_display = if result.url.chars().count() > 57 {
            format!("{}...", result.url.chars().take(57).collect::<String>())
        } else {
            result.url.clone()
        };
        let since = result
            .first_broken
            .as_ref()
            .map(model::timestamp::format)
            .unwrap_or_default();

        println!(
            "{:<60} {:<40} {:<20}",
            url_display,
            format_status(&result.status),
            since
        );
    }

    println!();

    let counts = server::Counts::of(results);
    println!("📊 Summary:");
    println!("   ✅ OK: {}", counts.ok);
    println!("   ❌ Broken: {}", counts.failing);
    println!("   ⚠️  Warnings: {}", counts.warning);
    println!("   📋 Total: {}", counts.total);
}

fn format_status(status: &LinkStatus) -> String {
    match status {
        LinkStatus::Ok => "✅ OK".to_string(),
        LinkStatus::Restricted(_) => format!("🔒 {}", status),
        LinkStatus::Error(_) => format!("❌ {}", status),
        LinkStatus::Broken => "💥 Broken".to_string(),
        LinkStatus::TlsLegacyRenegotiation | LinkStatus::TlsHandshakeFailure => {
            format!("🔐 {}", status)
        }
    }
}
