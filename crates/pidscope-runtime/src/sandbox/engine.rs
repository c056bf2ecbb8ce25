use futures::future::BoxFuture;

use super::fs::VirtualFs;
use super::relay::StatusReporter;
use crate::config::PackageSpec;
use crate::scripts::Script;

/// Interpreter hosting the analysis scripts.
///
/// The sandbox owns exactly one engine and never calls `run` concurrently.
/// Scripts exchange data only through the `VirtualFs` handed to `run` and
/// report progress through the `StatusReporter` handed to `load`.
pub trait ScriptEngine: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Bring the interpreter up. `reporter` is the callback scripts use to
    /// emit `(step, payload)` statuses for the rest of the engine's life.
    fn load(&self, reporter: StatusReporter) -> BoxFuture<'_, anyhow::Result<()>>;

    fn install_packages<'a>(
        &'a self,
        packages: &'a [PackageSpec],
    ) -> BoxFuture<'a, anyhow::Result<()>>;

    /// Run one script to completion. An `Err` means the script raised.
    fn run<'a>(&'a self, script: &'a Script, fs: &'a VirtualFs)
    -> BoxFuture<'a, anyhow::Result<()>>;
}
