//! # gatesync repository
//!
//! Stores consumed and written by the synchronization engine and the
//! management plane.
//!
//! This crate provides:
//! - The event log ([`EventRepository`]) with its latest-per-entity query
//! - The latest-event index written by the management plane
//! - Environment, organization and plan lookups
//! - Shared policy group records and their deployment history
//! - Thread-safe in-memory implementations of every store
//! - A JSON snapshot format loading the in-memory stores from disk
//!
//! In-memory stores count their calls and can be switched to an
//! unavailable state, which makes them usable as test doubles.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod availability;
mod error;
mod event;
mod event_latest;
mod plan;
mod reference;
mod shared_policy_group;
mod snapshot;

pub use error::{RepositoryError, RepositoryResult};
pub use event::{EventRepository, InMemoryEventRepository};
pub use event_latest::{EventLatestRepository, InMemoryEventLatestRepository};
pub use plan::{InMemoryPlanRepository, PlanRepository};
pub use reference::{
    Environment, EnvironmentRepository, InMemoryEnvironmentRepository,
    InMemoryOrganizationRepository, Organization, OrganizationRepository,
};
pub use shared_policy_group::{
    InMemorySharedPolicyGroupHistoryRepository, InMemorySharedPolicyGroupRepository,
    SharedPolicyGroupHistoryRepository, SharedPolicyGroupRepository,
};
pub use snapshot::{Snapshot, SnapshotRepositories};
