//! Entity kinds reconciled by the gateway.

mod api;
mod dictionary;
mod organization;
mod shared_policy_group;

pub use api::{ApiDeploymentListener, ApiKind};
pub use dictionary::DictionaryKind;
pub use organization::OrganizationKind;
pub use shared_policy_group::SharedPolicyGroupKind;

use gatesync_protocol::Event;

// Definitions may omit their environment; the event always targets it.
fn event_environment(event: &Event) -> Option<String> {
    event.environments.iter().next().cloned()
}
