use super::FlowError;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// The checkout modal: at most one upgrade flow in flight per process
#[derive(Clone, Default)]
pub struct CheckoutSlot {
    lock: Arc<Mutex<()>>,
}

/// Held for the lifetime of one checkout; dropping it frees the slot
pub struct CheckoutGuard {
    _guard: OwnedMutexGuard<()>,
}

impl CheckoutSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot without waiting
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::SlotTaken`] while another checkout holds it
    pub fn try_acquire(&self) -> Result<CheckoutGuard, FlowError> {
        Arc::clone(&self.lock)
            .try_lock_owned()
            .map(|guard| CheckoutGuard { _guard: guard })
            .map_err(|_| FlowError::SlotTaken)
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}
