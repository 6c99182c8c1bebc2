//! Failure switch shared by the in-memory stores.

use crate::error::{RepositoryError, RepositoryResult};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub(crate) struct Availability {
    unavailable: AtomicBool,
}

impl Availability {
    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub(crate) fn check(&self, store: &'static str) -> RepositoryResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(RepositoryError::unavailable(store, "store switched off"))
        } else {
            Ok(())
        }
    }
}
