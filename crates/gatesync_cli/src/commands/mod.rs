//! CLI command implementations.

pub mod inspect;
pub mod sync;
pub mod watch;

use clap::ValueEnum;
use gatesync_engine::{DebugHandler, GatewaySync, ReactableApi, SyncConfig, SyncReport};
use gatesync_protocol::Event;
use gatesync_repository::Snapshot;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Gateway flags shared by `sync` and `watch`.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Environments served.
    pub environments: Vec<String>,
    /// Page size.
    pub bulk_items: usize,
    /// Sharding tags.
    pub tags: Vec<String>,
    /// Delay between runs, when scheduled.
    pub interval: Option<Duration>,
    /// Accept pending API debug requests.
    pub debug_requests: bool,
}

impl GatewayOptions {
    fn config(&self) -> SyncConfig {
        let config = SyncConfig::new(self.environments.iter().cloned())
            .with_bulk_items(self.bulk_items)
            .with_sharding_tags(self.tags.iter().cloned());
        match self.interval {
            Some(delay) => config.with_delay(delay),
            None => config,
        }
    }
}

/// Entity kinds known to the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EntityKind {
    /// APIs.
    Api,
    /// Dictionaries.
    Dictionary,
    /// Organizations.
    Organization,
    /// Shared policy groups.
    SharedPolicyGroup,
}

/// Loads a snapshot and wires a gateway over it.
pub fn open_gateway(
    snapshot: &Path,
    options: &GatewayOptions,
) -> Result<GatewaySync, Box<dyn std::error::Error>> {
    let snapshot = Snapshot::load(snapshot)?;
    let gateway = GatewaySync::new(options.config(), snapshot.into_repositories().into())?;
    if options.debug_requests {
        return Ok(gateway.with_debug_handler(Arc::new(LoggingDebugHandler)));
    }
    Ok(gateway)
}

/// Accepts every debug request and logs it.
pub struct LoggingDebugHandler;

impl DebugHandler for LoggingDebugHandler {
    fn handle(&self, event: &Event, api: &ReactableApi) -> bool {
        info!(
            event_id = %event.id,
            api_id = %api.definition.id,
            environment = api.environment_hrid.as_deref().unwrap_or("-"),
            "debug request received"
        );
        true
    }
}

/// Outcome of one synchronizer run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    /// Job name.
    pub job: String,
    /// Pages fetched.
    pub pages: usize,
    /// Events fetched.
    pub fetched: usize,
    /// Register calls.
    pub registered: usize,
    /// Unregister calls.
    pub unregistered: usize,
    /// Undecodable events.
    pub failed: usize,
}

impl RunSummary {
    fn new(job: &str, report: &SyncReport) -> Self {
        Self {
            job: job.to_string(),
            pages: report.pages,
            fetched: report.fetched,
            registered: report.registered,
            unregistered: report.unregistered,
            failed: report.failed,
        }
    }
}

/// Contents of every registry of a gateway.
#[derive(Debug, Serialize)]
pub struct RegistrySummary {
    /// Runs that produced this state, if any.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub runs: Vec<RunSummary>,
    /// Deployed API IDs.
    pub apis: Vec<String>,
    /// Deployed dictionary IDs.
    pub dictionaries: Vec<String>,
    /// Known organization IDs.
    pub organizations: Vec<String>,
    /// Deployed shared policy groups as `cross_id@environment`.
    pub shared_policy_groups: Vec<String>,
}

impl RegistrySummary {
    /// Collects the registries of `gateway`.
    pub fn collect(gateway: &GatewaySync, reports: &[(&'static str, SyncReport)]) -> Self {
        let mut apis: Vec<String> = gateway
            .apis()
            .apis()
            .into_iter()
            .map(|api| api.definition.id)
            .collect();
        let mut dictionaries: Vec<String> = gateway
            .dictionaries()
            .dictionaries()
            .into_iter()
            .map(|dictionary| dictionary.definition.id)
            .collect();
        let mut organizations: Vec<String> = gateway
            .organizations()
            .organizations()
            .into_iter()
            .map(|organization| organization.definition.id)
            .collect();
        let mut shared_policy_groups: Vec<String> = gateway
            .shared_policy_groups()
            .groups()
            .into_iter()
            .map(|group| {
                format!(
                    "{}@{}",
                    group.definition.cross_id, group.definition.environment_id
                )
            })
            .collect();
        apis.sort();
        dictionaries.sort();
        organizations.sort();
        shared_policy_groups.sort();

        Self {
            runs: reports
                .iter()
                .map(|(job, report)| RunSummary::new(job, report))
                .collect(),
            apis,
            dictionaries,
            organizations,
            shared_policy_groups,
        }
    }

    /// Prints the summary in `format`.
    pub fn print(&self, format: &str) -> Result<(), Box<dyn std::error::Error>> {
        match format {
            "json" => {
                println!("{}", serde_json::to_string_pretty(self)?);
            }
            _ => self.print_text(),
        }
        Ok(())
    }

    fn print_text(&self) {
        for run in &self.runs {
            println!(
                "{:<20} pages={} fetched={} registered={} unregistered={} failed={}",
                run.job, run.pages, run.fetched, run.registered, run.unregistered, run.failed
            );
        }
        if !self.runs.is_empty() {
            println!();
        }
        print_list("APIs", &self.apis);
        print_list("Dictionaries", &self.dictionaries);
        print_list("Organizations", &self.organizations);
        print_list("Shared policy groups", &self.shared_policy_groups);
    }
}

fn print_list(title: &str, ids: &[String]) {
    println!("{} ({})", title, ids.len());
    for id in ids {
        println!("  {}", id);
    }
}
