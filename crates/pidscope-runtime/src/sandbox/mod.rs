mod engine;
mod fs;
mod relay;
mod slot;

pub use engine::ScriptEngine;
pub use fs::VirtualFs;
pub use relay::{StatusRelay, StatusReporter};
pub use slot::{ExecutionSlot, SlotGuard};

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use pidscope_types::RawStatus;
use tokio::sync::{OnceCell, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::PackageSpec;
use crate::scripts::Script;
use crate::{Error, Result};

/// How a script execution ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed,
    /// The script raised or panicked; the sandbox stays usable.
    Failed(String),
}

impl ExecutionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ExecutionOutcome::Completed)
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            ExecutionOutcome::Completed => None,
            ExecutionOutcome::Failed(message) => Some(message),
        }
    }
}

/// Owns the script engine and serializes every use of it.
///
/// One execution runs at a time; later callers queue in FIFO order. The
/// virtual file store is shared by all executions, so its contents are only
/// meaningful to a caller holding a [`SandboxSession`].
pub struct ComputationSandbox {
    engine: Arc<dyn ScriptEngine>,
    packages: Vec<PackageSpec>,
    fs: Arc<VirtualFs>,
    slot: ExecutionSlot,
    relay: Arc<StatusRelay>,
    init: OnceCell<std::result::Result<(), String>>,
}

impl ComputationSandbox {
    pub fn new(engine: Arc<dyn ScriptEngine>, packages: Vec<PackageSpec>) -> Self {
        Self {
            engine,
            packages,
            fs: Arc::new(VirtualFs::new()),
            slot: ExecutionSlot::new(),
            relay: StatusRelay::new(),
            init: OnceCell::new(),
        }
    }

    pub fn fs(&self) -> &VirtualFs {
        &self.fs
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.init.get(), Some(Ok(())))
    }

    pub fn is_busy(&self) -> bool {
        self.slot.is_busy()
    }

    /// Load the engine and install packages.
    ///
    /// Idempotent. Concurrent callers share one initialization, and a failed
    /// initialization is remembered: every later call returns the same error.
    pub async fn initialize(&self) -> Result<()> {
        let state = self
            .init
            .get_or_init(|| async {
                info!(
                    engine = self.engine.name(),
                    packages = self.packages.len(),
                    "Initializing computation sandbox"
                );
                match self.bring_up().await {
                    Ok(()) => {
                        info!(engine = self.engine.name(), "Computation sandbox ready");
                        Ok(())
                    }
                    Err(err) => {
                        let message = format!("{:#}", err);
                        error!(engine = self.engine.name(), error = %message, "Sandbox initialization failed");
                        Err(message)
                    }
                }
            })
            .await;

        state.clone().map_err(Error::Initialization)
    }

    async fn bring_up(&self) -> anyhow::Result<()> {
        use anyhow::Context;

        self.engine
            .load(self.relay.reporter())
            .await
            .context("failed to load engine")?;

        if !self.packages.is_empty() {
            let names: Vec<&str> = self.packages.iter().map(|p| p.name.as_str()).collect();
            debug!(packages = ?names, "Installing packages");
            self.engine
                .install_packages(&self.packages)
                .await
                .context("failed to install packages")?;
        }

        Ok(())
    }

    /// Wait for the execution slot and hold it until the session is dropped.
    ///
    /// Stages stage their inputs, execute and read their outputs within one
    /// session so no other execution touches the store in between.
    pub async fn session(&self) -> Result<SandboxSession<'_>> {
        self.ensure_ready()?;

        if self.slot.is_busy() {
            debug!(engine = self.engine.name(), "Waiting for execution slot");
        }
        let slot = self.slot.acquire().await;

        Ok(SandboxSession {
            sandbox: self,
            slot,
        })
    }

    /// Run `script` in a session of its own.
    ///
    /// Script errors and panics become [`ExecutionOutcome::Failed`]. `Err` is
    /// returned only when the sandbox itself is unusable.
    pub async fn execute<F>(&self, script: &Script, on_status: Option<F>) -> Result<ExecutionOutcome>
    where
        F: FnMut(RawStatus) + Send,
    {
        let session = self.session().await?;
        Ok(session.execute(script, on_status).await)
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.init.get() {
            Some(Ok(())) => Ok(()),
            Some(Err(message)) => Err(Error::Initialization(message.clone())),
            None => Err(Error::NotInitialized),
        }
    }
}

/// Exclusive use of the sandbox; the slot is released on drop.
pub struct SandboxSession<'a> {
    sandbox: &'a ComputationSandbox,
    slot: SlotGuard,
}

impl SandboxSession<'_> {
    pub fn fs(&self) -> &VirtualFs {
        &self.sandbox.fs
    }

    /// Run `script`, forwarding its statuses to `on_status` in emission order.
    ///
    /// The run itself is a task of its own holding the slot. Dropping this
    /// future stops the forwarding but not the script; the slot is released
    /// only once the engine returns.
    pub async fn execute<F>(&self, script: &Script, mut on_status: Option<F>) -> ExecutionOutcome
    where
        F: FnMut(RawStatus) + Send,
    {
        let sandbox = self.sandbox;
        let execution_id = Uuid::new_v4();
        let script_name = script.name();

        let (sender, mut receiver) = mpsc::unbounded_channel();
        let binding = sandbox.relay.bind(sender);
        debug!(%execution_id, script = %script_name, "Execution started");

        let engine = Arc::clone(&sandbox.engine);
        let fs = Arc::clone(&sandbox.fs);
        let script = script.clone();
        let slot = self.slot.clone();
        let mut run = tokio::spawn(async move {
            let result = AssertUnwindSafe(engine.run(&script, &fs)).catch_unwind().await;
            drop(binding);
            drop(slot);
            result
        });

        let result = loop {
            tokio::select! {
                biased;
                Some(status) = receiver.recv() => forward(&mut on_status, status),
                result = &mut run => break result,
            }
        };

        while let Ok(status) = receiver.try_recv() {
            forward(&mut on_status, status);
        }

        let outcome = match result {
            Ok(Ok(Ok(()))) => ExecutionOutcome::Completed,
            Ok(Ok(Err(err))) => ExecutionOutcome::Failed(format!("{:#}", err)),
            Ok(Err(panic)) => ExecutionOutcome::Failed(panic_message(panic)),
            Err(err) => ExecutionOutcome::Failed(format!("execution task failed: {}", err)),
        };

        match &outcome {
            ExecutionOutcome::Completed => {
                debug!(%execution_id, script = %script_name, "Execution finished")
            }
            ExecutionOutcome::Failed(message) => {
                warn!(%execution_id, script = %script_name, error = %message, "Script execution failed")
            }
        }

        outcome
    }
}

fn forward<F: FnMut(RawStatus)>(on_status: &mut Option<F>, status: RawStatus) {
    if let Some(f) = on_status.as_mut() {
        f(status);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("script panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("script panicked: {}", message)
    } else {
        "script panicked".to_string()
    }
}
