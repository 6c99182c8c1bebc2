//! Process-local registries of active runtime objects.
//!
//! Registries are the only side effect of synchronization visible to the
//! rest of a gateway. They are safe under concurrent register/unregister so
//! overlapping runs do not corrupt them.

mod api;
mod dictionary;
mod organization;
mod shared_policy_group;

pub use api::{ActionOnApi, ApiRegistry};
pub use dictionary::DictionaryRegistry;
pub use organization::OrganizationRegistry;
pub use shared_policy_group::SharedPolicyGroupRegistry;

use crate::reference::ReferenceEntry;
use gatesync_protocol::{
    ApiDefinition, DictionaryDefinition, OrganizationDefinition, SharedPolicyGroup,
};
use std::sync::atomic::{AtomicU64, Ordering};

/// A definition enriched with the identifiers of its environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Reactable<T> {
    /// The deployed definition.
    pub definition: T,
    /// Owning environment.
    pub environment_id: Option<String>,
    /// Environment human-readable ID.
    pub environment_hrid: Option<String>,
    /// Owning organization.
    pub organization_id: Option<String>,
    /// Organization human-readable ID.
    pub organization_hrid: Option<String>,
}

impl<T> Reactable<T> {
    /// Wraps a definition with no resolved identifiers.
    pub fn new(definition: T) -> Self {
        Self {
            definition,
            environment_id: None,
            environment_hrid: None,
            organization_id: None,
            organization_hrid: None,
        }
    }

    /// Sets the owning environment.
    pub fn with_environment(mut self, environment_id: Option<String>) -> Self {
        self.environment_id = environment_id;
        self
    }

    /// Copies resolved identifiers onto the object.
    pub fn apply_references(&mut self, entry: &ReferenceEntry) {
        self.environment_id = Some(entry.environment_id.clone());
        self.environment_hrid = entry.environment_hrid.clone();
        self.organization_id = entry.organization_id.clone();
        self.organization_hrid = entry.organization_hrid.clone();
    }
}

/// A deployable API.
pub type ReactableApi = Reactable<ApiDefinition>;
/// A deployable dictionary.
pub type ReactableDictionary = Reactable<DictionaryDefinition>;
/// A deployable organization.
pub type ReactableOrganization = Reactable<OrganizationDefinition>;
/// A deployable shared policy group.
pub type ReactableSharedPolicyGroup = Reactable<SharedPolicyGroup>;

/// Call counts of a registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of `register` calls.
    pub register_calls: u64,
    /// Number of `unregister` calls.
    pub unregister_calls: u64,
}

#[derive(Debug, Default)]
pub(crate) struct RegistryCounters {
    register_calls: AtomicU64,
    unregister_calls: AtomicU64,
}

impl RegistryCounters {
    pub(crate) fn registered(&self) {
        self.register_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn unregistered(&self) {
        self.unregister_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> RegistryStats {
        RegistryStats {
            register_calls: self.register_calls.load(Ordering::Relaxed),
            unregister_calls: self.unregister_calls.load(Ordering::Relaxed),
        }
    }
}
