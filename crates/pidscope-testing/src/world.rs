//! TestWorld pattern for declarative pipeline test setup.
//!
//! Provides a fluent interface for:
//! - Creating an isolated scripts directory and runtime config
//! - Choosing the engine and decoder doubles
//! - Building sandboxes wired to those doubles

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pidscope_runtime::{ComputationSandbox, RuntimeConfig, ScriptLibrary, ScriptName};
use tempfile::TempDir;

use crate::decoder::FakeDecoder;
use crate::engine::ScriptedEngine;

/// Declarative test environment builder.
///
/// # Example
/// ```no_run
/// use pidscope_testing::{AnalysisFault, ScriptedEngine, TestWorld};
///
/// let world = TestWorld::new()
///     .with_engine(ScriptedEngine::new().with_fault(2, AnalysisFault::Report("boom".into())));
///
/// let sandbox = world.sandbox();
/// let scripts = world.scripts();
/// ```
pub struct TestWorld {
    temp_dir: TempDir,
    scripts_dir: PathBuf,
    config: RuntimeConfig,
    engine: Arc<ScriptedEngine>,
    decoder: Arc<FakeDecoder>,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorld {
    /// Create an environment with both scripts on disk and default doubles.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let scripts_dir = temp_dir.path().join("scripts");
        std::fs::create_dir_all(&scripts_dir).expect("Failed to create scripts dir");

        for name in [ScriptName::SplitBbl, ScriptName::AnalyzeOneFlight] {
            std::fs::write(
                scripts_dir.join(name.file_name()),
                format!("# {}\nawait async_run()\n", name),
            )
            .expect("Failed to write script");
        }

        let config = RuntimeConfig {
            scripts_dir: Some(scripts_dir.clone()),
            ..RuntimeConfig::default()
        };

        Self {
            temp_dir,
            scripts_dir,
            config,
            engine: Arc::new(ScriptedEngine::new()),
            decoder: Arc::new(FakeDecoder::new()),
        }
    }

    pub fn with_engine(mut self, engine: ScriptedEngine) -> Self {
        self.engine = Arc::new(engine);
        self
    }

    /// Delete a script from the scripts directory.
    pub fn without_script(self, name: ScriptName) -> Self {
        std::fs::remove_file(self.scripts_dir.join(name.file_name()))
            .expect("Failed to remove script");
        self
    }

    pub fn with_package_index(mut self, origin: &str) -> Self {
        self.config.package_index = Some(origin.to_string());
        self
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Save the config under the temp dir and return its path.
    pub fn write_config(&self) -> PathBuf {
        let path = self.temp_dir.path().join("pidscope").join("config.toml");
        self.config.save_to(&path).expect("Failed to save config");
        path
    }

    pub fn engine(&self) -> Arc<ScriptedEngine> {
        Arc::clone(&self.engine)
    }

    pub fn decoder(&self) -> Arc<FakeDecoder> {
        Arc::clone(&self.decoder)
    }

    /// A fresh, uninitialized sandbox over this world's engine.
    pub fn sandbox(&self) -> ComputationSandbox {
        ComputationSandbox::new(self.engine(), self.config.package_specs())
    }

    pub fn scripts(&self) -> ScriptLibrary {
        self.config.script_library()
    }
}
