//! # gatesync testkit
//!
//! Test utilities for gatesync.
//!
//! This crate provides:
//! - Definition and event builders for every entity kind
//! - Seeded in-memory stores
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gatesync_testkit::prelude::*;
//!
//! #[test]
//! fn deploys_an_api() {
//!     let stores = TestStores::new();
//!     stores.publish(api_event(&api("api-1"), EventType::StartApi, 10));
//!     // ... build a gateway over stores.repositories()
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use gatesync_protocol::EventType;
}

pub use fixtures::*;
pub use generators::*;
