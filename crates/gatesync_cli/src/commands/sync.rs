//! Sync command implementation.

use super::{open_gateway, GatewayOptions, RegistrySummary};
use gatesync_protocol::now_millis;
use std::path::Path;
use tracing::info;

/// Runs the sync command.
pub fn run(
    snapshot: &Path,
    options: &GatewayOptions,
    from: i64,
    to: Option<i64>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let summary = execute(snapshot, options, from, to.unwrap_or_else(now_millis))?;
    summary.print(format)
}

/// Runs every synchronizer once over `[from, to)`.
pub fn execute(
    snapshot: &Path,
    options: &GatewayOptions,
    from: i64,
    to: i64,
) -> Result<RegistrySummary, Box<dyn std::error::Error>> {
    let gateway = open_gateway(snapshot, options)?;
    info!(snapshot = %snapshot.display(), from, to, "synchronizing snapshot");
    let reports = gateway.synchronize_once(from, to)?;
    Ok(RegistrySummary::collect(&gateway, &reports))
}
