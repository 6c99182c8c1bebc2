//! Watch command implementation.

use super::{open_gateway, GatewayOptions, RegistrySummary};
use gatesync_engine::{GatewaySync, SyncReport};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Runs the watch command.
pub fn run(
    snapshot: &Path,
    options: &GatewayOptions,
    duration: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let gateway = open_gateway(snapshot, options)?;
    let runtime = tokio::runtime::Runtime::new()?;
    let reports = runtime.block_on(watch(&gateway, duration));

    info!(elapsed_ms = duration.as_millis() as u64, "scheduler stopped");
    RegistrySummary::collect(&gateway, &reports).print("text")
}

/// Runs one pass of every job, then the scheduler loops for `duration` or
/// until interrupted.
///
/// A failed first pass is logged and the loops start anyway; they retry the
/// same window on their own. Returns the reports of the first pass.
pub async fn watch(gateway: &GatewaySync, duration: Duration) -> Vec<(&'static str, SyncReport)> {
    let mut scheduler = gateway.scheduler();
    let reports = match scheduler.synchronize_all_once().await {
        Ok(reports) => reports,
        Err(e) => {
            warn!(error = %e, "initial synchronization failed, scheduler will retry");
            Vec::new()
        }
    };
    scheduler.start();

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }
    scheduler.shutdown().await;
    reports
}
