//! # gatesync engine
//!
//! Keeps the registries of a gateway node in line with the event log
//! written by the management plane.
//!
//! This crate provides:
//! - A generic [`Synchronizer`] applying latest-event-wins reconciliation
//!   over paginated event log queries
//! - Entity kinds for APIs, dictionaries, organizations and shared policy
//!   groups, each feeding its own registry
//! - A [`ReferenceResolver`] caching environment and organization identifiers
//! - Sharding tag matching for API deployment
//! - A bounded executor and a fixed-delay [`SyncScheduler`]
//! - Shared policy group step expansion and debug request dispatch
//!
//! ## Example
//!
//! ```rust,no_run
//! use gatesync_engine::{GatewaySync, SyncConfig};
//! use gatesync_repository::Snapshot;
//!
//! let snapshot = Snapshot::load("snapshot.json")?;
//! let gateway = GatewaySync::new(SyncConfig::new(["DEFAULT"]), snapshot.into_repositories().into())?;
//! for (job, report) in gateway.synchronize_once(-1, gatesync_protocol::now_millis())? {
//!     println!("{job}: {} registered", report.registered);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod debug;
mod error;
mod gateway;
mod kinds;
mod policy;
mod reference;
mod registry;
mod scheduler;
mod synchronizer;
mod tags;

pub use config::SyncConfig;
pub use debug::{DebugEventDispatcher, DebugHandler};
pub use error::{SyncError, SyncResult};
pub use gateway::{GatewayStores, GatewaySync};
pub use kinds::{
    ApiDeploymentListener, ApiKind, DictionaryKind, OrganizationKind, SharedPolicyGroupKind,
};
pub use policy::SharedPolicyGroupPolicyResolver;
pub use reference::{ReferenceEntry, ReferenceResolver};
pub use registry::{
    ActionOnApi, ApiRegistry, DictionaryRegistry, OrganizationRegistry, Reactable, ReactableApi,
    ReactableDictionary, ReactableOrganization, ReactableSharedPolicyGroup, RegistryStats,
    SharedPolicyGroupRegistry,
};
pub use scheduler::{SyncExecutor, SyncJob, SyncScheduler};
pub use synchronizer::{
    AppliedChanges, SyncAction, SyncKind, SyncReport, SyncStats, Synchronizer, UnregisterTarget,
};
pub use tags::ShardingTags;
