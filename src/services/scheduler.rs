//! Interval trigger for organization scans.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use super::scan::ScanOrchestrator;

/// Start the background task that runs a scan every `every`.
///
/// The first scan starts one full interval after startup.
pub fn start_scan_task(orchestrator: Arc<ScanOrchestrator>, every: Duration) {
    tokio::spawn(async move {
        info!("Starting scheduled scans (interval: {} seconds)", every.as_secs());

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match orchestrator.perform_scan().await {
                Ok(summary) => info!(
                    scan_id = %summary.scan_id,
                    status = %summary.status,
                    "Scheduled scan finished"
                ),
                Err(e) => error!("Scheduled scan error: {}", e),
            }
        }
    });
}
