// src/scheduler.rs
// =============================================================================
// Background loops started by `serve`:
// - the auto-refresh loop: check every dataset, one after the other, then
//   sleep for the refresh interval
// - the optional self-pinger that keeps a sleeping host awake
//
// A scheduled run that collides with a manual one is skipped, not queued.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use crate::config;
use crate::error::RunError;
use crate::model::Dataset;
use crate::run::{Coordinator, Trigger};

pub async fn auto_refresh(coordinator: Arc<Coordinator>, interval: Duration) {
    loop {
        log::info!("[Scheduler] Auto-refresh round starting");
        run_round(&coordinator).await;
        tokio::time::sleep(interval).await;
    }
}

// One scheduled check of every dataset, in order
pub async fn run_round(coordinator: &Coordinator) {
    for dataset in Dataset::ALL {
        match coordinator.run(dataset, Trigger::Scheduled).await {
            Ok(snapshot) => log::info!(
                "[Scheduler] {} done, {} results",
                dataset,
                snapshot.results.len()
            ),
            Err(RunError::AlreadyRunning) => {
                log::warn!("[Scheduler] {} skipped, another check is in progress", dataset)
            }
            Err(e) => log::error!("[Scheduler] {} failed: {}", dataset, e),
        }
    }
}

pub async fn self_pinger(url: String) {
    let client = match reqwest::Client::builder()
        .timeout(config::SELF_PING_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            log::error!("[Self-Pinger] Could not build HTTP client: {}", e);
            return;
        }
    };

    // Don't ping before the server is up
    tokio::time::sleep(config::SELF_PING_WARMUP).await;
    loop {
        log::info!("[Self-Pinger] Pinging {}", url);
        if let Err(e) = client.get(&url).send().await {
            log::warn!("[Self-Pinger] Error: {}", e);
        }
        tokio::time::sleep(config::SELF_PING_INTERVAL).await;
    }
}
