use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pidscope_types::RawStatus;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

/// Process-wide status channel between scripts and the current caller.
///
/// The engine holds a [`StatusReporter`] for its whole life; the sandbox binds
/// the relay to a per-execution receiver and unbinds it when the execution
/// ends. Statuses reported while unbound are dropped.
#[derive(Debug, Default)]
pub struct StatusRelay {
    target: Mutex<Option<UnboundedSender<RawStatus>>>,
}

impl StatusRelay {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reporter(self: &Arc<Self>) -> StatusReporter {
        StatusReporter {
            relay: Some(Arc::clone(self)),
        }
    }

    pub fn is_bound(&self) -> bool {
        self.target().is_some()
    }

    /// Route statuses to `sender` until the returned binding is dropped.
    pub(crate) fn bind(self: &Arc<Self>, sender: UnboundedSender<RawStatus>) -> RelayBinding {
        *self.target() = Some(sender);
        RelayBinding {
            relay: Arc::clone(self),
        }
    }

    fn deliver(&self, status: RawStatus) -> bool {
        match self.target().as_ref() {
            Some(sender) => sender.send(status).is_ok(),
            None => false,
        }
    }

    fn target(&self) -> MutexGuard<'_, Option<UnboundedSender<RawStatus>>> {
        self.target.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Unbinds the relay on drop. Owned by the running script, so it outlives a
/// caller that stops listening.
pub(crate) struct RelayBinding {
    relay: Arc<StatusRelay>,
}

impl Drop for RelayBinding {
    fn drop(&mut self) {
        self.relay.target().take();
    }
}

/// Handle scripts use to publish progress
#[derive(Debug, Clone, Default)]
pub struct StatusReporter {
    relay: Option<Arc<StatusRelay>>,
}

impl StatusReporter {
    /// A reporter connected to nothing
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn report(&self, step: &str, payload: Option<Value>) -> bool {
        self.send(RawStatus {
            step: step.to_string(),
            payload,
        })
    }

    /// Returns whether a caller was listening.
    pub fn send(&self, status: RawStatus) -> bool {
        match &self.relay {
            Some(relay) => relay.deliver(status),
            None => false,
        }
    }
}
