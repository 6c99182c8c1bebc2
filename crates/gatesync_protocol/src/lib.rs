//! # gatesync protocol
//!
//! Types exchanged between the management plane and gateway nodes through
//! the event log.
//!
//! This crate provides:
//! - [`Event`], [`EventType`] and [`EventProperty`] for event log records
//! - [`EventCriteria`] and [`SyncWindow`] for event log queries
//! - Entity definitions carried as event payloads (APIs, plans,
//!   dictionaries, organizations, shared policy groups)
//! - JSON payload encoding and decoding
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod codec;
mod criteria;
mod dictionary;
mod error;
mod event;
mod flow;
mod organization;
mod shared_policy_group;

pub use api::{ApiDefinition, DefinitionVersion, Plan, PlanStatus};
pub use codec::{decode_payload, encode_payload};
pub use criteria::{EventCriteria, SyncWindow};
pub use dictionary::DictionaryDefinition;
pub use error::{ProtocolError, ProtocolResult};
pub use event::{now_millis, Event, EventProperty, EventType, DEBUG_STATUS_DEBUGGING, DEBUG_STATUS_TO_DEBUG};
pub use flow::{Flow, FlowPhase, Step, SHARED_POLICY_GROUP_POLICY};
pub use organization::OrganizationDefinition;
pub use shared_policy_group::{LifecycleState, SharedPolicyGroup};
