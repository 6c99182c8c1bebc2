//! Plan store, consulted for legacy API definitions.

use crate::availability::Availability;
use crate::error::RepositoryResult;
use gatesync_protocol::Plan;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;

/// Bulk plan lookups.
pub trait PlanRepository: Send + Sync {
    /// Returns the plans of every listed API.
    fn find_by_apis(&self, api_ids: &[String]) -> RepositoryResult<Vec<Plan>>;
}

/// An in-memory plan store that records every request.
#[derive(Debug, Default)]
pub struct InMemoryPlanRepository {
    plans: RwLock<Vec<Plan>>,
    requests: Mutex<Vec<Vec<String>>>,
    availability: Availability,
}

impl InMemoryPlanRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given plans.
    #[must_use]
    pub fn with_plans(plans: impl IntoIterator<Item = Plan>) -> Self {
        let repository = Self::new();
        repository.plans.write().extend(plans);
        repository
    }

    /// Adds a plan.
    pub fn insert(&self, plan: Plan) {
        self.plans.write().push(plan);
    }

    /// Returns the API IDs of every `find_by_apis` call, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().clone()
    }

    /// Number of `find_by_apis` calls.
    #[must_use]
    pub fn find_by_apis_calls(&self) -> usize {
        self.requests.lock().len()
    }

    /// Makes every call fail with an unavailable error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.availability.set_unavailable(unavailable);
    }
}

impl PlanRepository for InMemoryPlanRepository {
    fn find_by_apis(&self, api_ids: &[String]) -> RepositoryResult<Vec<Plan>> {
        self.requests.lock().push(api_ids.to_vec());
        self.availability.check("plan")?;

        let wanted: HashSet<&str> = api_ids.iter().map(String::as_str).collect();
        Ok(self
            .plans
            .read()
            .iter()
            .filter(|plan| wanted.contains(plan.api.as_str()))
            .cloned()
            .collect())
    }
}
