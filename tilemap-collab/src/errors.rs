//! Dismissible list of store failures for display.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::store::{ErrorFn, StoreError};

/// Collects errors reported through [`ErrorLog::sink`] until dismissed.
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    errors: Arc<Mutex<Vec<StoreError>>>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Error callback that logs and records each failure.
    pub fn sink(&self) -> ErrorFn {
        let errors = self.errors.clone();
        Arc::new(move |e: &StoreError| {
            log::warn!("Store error: {e}");
            lock(&errors).push(e.clone());
        })
    }

    pub fn errors(&self) -> Vec<StoreError> {
        lock(&self.errors).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.errors).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.errors).is_empty()
    }

    /// Remove the error at `index`; returns it if it existed.
    pub fn dismiss(&self, index: usize) -> Option<StoreError> {
        let mut errors = lock(&self.errors);
        (index < errors.len()).then(|| errors.remove(index))
    }

    pub fn clear(&self) {
        lock(&self.errors).clear();
    }
}

fn lock(errors: &Mutex<Vec<StoreError>>) -> MutexGuard<'_, Vec<StoreError>> {
    errors.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
