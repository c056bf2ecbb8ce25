use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use crate::{Error, Result};

/// The scripts the pipeline runs inside the sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptName {
    SplitBbl,
    AnalyzeOneFlight,
}

impl ScriptName {
    pub fn file_name(&self) -> &'static str {
        match self {
            ScriptName::SplitBbl => "split-bbl.py",
            ScriptName::AnalyzeOneFlight => "analyze-one-flight.py",
        }
    }
}

impl fmt::Display for ScriptName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Script source ready to hand to the engine
#[derive(Debug, Clone)]
pub struct Script {
    name: ScriptName,
    source: Arc<str>,
}

impl Script {
    pub fn new(name: ScriptName, source: impl Into<Arc<str>>) -> Self {
        Self {
            name,
            source: source.into(),
        }
    }

    pub fn name(&self) -> ScriptName {
        self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Resolves script sources: in-memory sources first, then the scripts directory.
#[derive(Debug, Clone, Default)]
pub struct ScriptLibrary {
    scripts_dir: Option<PathBuf>,
    sources: HashMap<ScriptName, Arc<str>>,
}

impl ScriptLibrary {
    pub fn new(scripts_dir: Option<PathBuf>) -> Self {
        Self {
            scripts_dir,
            sources: HashMap::new(),
        }
    }

    pub fn with_source(mut self, name: ScriptName, source: impl Into<Arc<str>>) -> Self {
        self.sources.insert(name, source.into());
        self
    }

    pub fn load(&self, name: ScriptName) -> Result<Script> {
        if let Some(source) = self.sources.get(&name) {
            return Ok(Script::new(name, source.clone()));
        }

        let Some(dir) = &self.scripts_dir else {
            return Err(Error::ScriptNotFound(format!(
                "{} (no scripts directory configured)",
                name
            )));
        };

        let path = dir.join(name.file_name());
        match std::fs::read_to_string(&path) {
            Ok(source) if source.trim().is_empty() => Err(Error::ScriptNotFound(format!(
                "{} is empty",
                path.display()
            ))),
            Ok(source) => Ok(Script::new(name, source)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(Error::ScriptNotFound(path.display().to_string()))
            }
            Err(err) => Err(Error::Io(err)),
        }
    }
}
