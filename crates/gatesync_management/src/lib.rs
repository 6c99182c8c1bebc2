//! # gatesync management
//!
//! Control-plane side of gateway synchronization.
//!
//! This crate provides:
//! - Shared policy group create, update, deploy, undeploy and delete
//! - Event publication into the log gateways poll
//! - A latest-event index updated on every lifecycle transition
//!
//! # Lifecycle
//!
//! A group starts UNDEPLOYED at version 0. Every deploy or undeploy bumps
//! the version, stamps a strictly increasing `updated_at`, appends a history
//! snapshot and publishes an event keyed by the group's cross ID. Rejected
//! requests fail with a typed error and publish nothing.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod clock;
mod context;
mod error;
mod publisher;
mod shared_policy_group;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::ManagementContext;
pub use error::{ManagementError, ManagementResult};
pub use publisher::EventPublisher;
pub use shared_policy_group::{
    NewSharedPolicyGroup, SharedPolicyGroupService, SharedPolicyGroupUpdate,
};
