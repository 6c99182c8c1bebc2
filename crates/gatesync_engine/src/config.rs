//! Configuration for gateway synchronization.

use crate::error::{SyncError, SyncResult};
use crate::tags::ShardingTags;
use std::collections::BTreeSet;
use std::time::Duration;

/// Configuration for the synchronizers and their scheduler.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Environments this node serves.
    pub environments: BTreeSet<String>,
    /// Page size of event log queries.
    pub bulk_items: usize,
    /// Delay between two runs of a synchronizer.
    pub delay: Duration,
    /// Number of runs that may execute at once.
    pub pool_size: usize,
    /// Widening applied before the lower bound of incremental windows.
    pub timeframe_before_delay: Duration,
    /// Widening applied after the upper bound of every window.
    pub timeframe_after_delay: Duration,
    /// Raw sharding tag entries, such as `"internal,!beta"`.
    pub sharding_tags: Vec<String>,
    /// Maximum number of environments kept by the reference cache.
    pub reference_cache_capacity: usize,
}

impl SyncConfig {
    /// Creates a configuration serving the given environments.
    pub fn new<S: Into<String>>(environments: impl IntoIterator<Item = S>) -> Self {
        Self {
            environments: environments.into_iter().map(Into::into).collect(),
            bulk_items: 100,
            delay: Duration::from_secs(5),
            pool_size: 1,
            timeframe_before_delay: Duration::from_secs(10 * 60),
            timeframe_after_delay: Duration::from_secs(60),
            sharding_tags: Vec::new(),
            reference_cache_capacity: 1024,
        }
    }

    /// Sets the page size.
    pub fn with_bulk_items(mut self, bulk_items: usize) -> Self {
        self.bulk_items = bulk_items;
        self
    }

    /// Sets the delay between runs.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the executor size. Values below one are raised to one.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    /// Sets the window widening.
    pub fn with_timeframe_delays(mut self, before: Duration, after: Duration) -> Self {
        self.timeframe_before_delay = before;
        self.timeframe_after_delay = after;
        self
    }

    /// Sets the sharding tags.
    pub fn with_sharding_tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.sharding_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the reference cache capacity.
    pub fn with_reference_cache_capacity(mut self, capacity: usize) -> Self {
        self.reference_cache_capacity = capacity;
        self
    }

    /// Parses the sharding tags.
    pub fn parsed_sharding_tags(&self) -> SyncResult<ShardingTags> {
        ShardingTags::parse(&self.sharding_tags)
    }

    /// Checks that the configuration can drive a synchronizer.
    pub fn validate(&self) -> SyncResult<()> {
        if self.environments.is_empty() {
            return Err(SyncError::invalid_config(
                "at least one environment is required",
            ));
        }
        if self.bulk_items == 0 {
            return Err(SyncError::invalid_config("bulk items must be positive"));
        }
        self.parsed_sharding_tags().map(|_| ())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(["DEFAULT"])
    }
}
