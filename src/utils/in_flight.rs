//! At-most-one-in-flight operation per id

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

use crate::types::*;

/// Registry of ids with an operation currently running
///
/// Clones share the same registry.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id` for the lifetime of the returned guard.
    ///
    /// Fails with [`ReconError::OperationInFlight`] if `id` is already claimed.
    pub fn acquire(&self, id: &str) -> ReconResult<InFlightGuard> {
        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        if !ids.insert(id.to_string()) {
            warn!(id, "Rejected concurrent operation");
            return Err(ReconError::OperationInFlight(id.to_string()));
        }
        Ok(InFlightGuard {
            ids: Arc::clone(&self.ids),
            id: id.to_string(),
        })
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }
}

/// Releases its id when dropped
#[derive(Debug)]
pub struct InFlightGuard {
    ids: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl InFlightGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}
