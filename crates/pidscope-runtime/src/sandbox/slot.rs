use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// The sandbox's single execution slot.
///
/// Waiters are admitted in the order they called [`ExecutionSlot::acquire`].
#[derive(Debug, Default)]
pub struct ExecutionSlot {
    lock: Arc<Mutex<()>>,
}

/// Holds the slot; it is freed once every clone of the guard is dropped.
///
/// A running script keeps a clone, so a caller that stops waiting does not
/// release the slot before the engine is done.
#[derive(Debug, Clone)]
pub struct SlotGuard {
    _guard: Arc<OwnedMutexGuard<()>>,
}

impl ExecutionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self) -> SlotGuard {
        SlotGuard {
            _guard: Arc::new(Arc::clone(&self.lock).lock_owned().await),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}
