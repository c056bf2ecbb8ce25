use crate::scripts::ScriptLibrary;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Numerical packages the analysis scripts import
pub const DEFAULT_PACKAGES: &[&str] = &["numpy", "pandas", "scipy"];

/// Resolve the configuration file path based on priority:
/// 1. PIDSCOPE_CONFIG environment variable (with tilde expansion)
/// 2. `<config dir>/pidscope/config.toml`
/// 3. ~/.pidscope/config.toml (fallback for systems without a config dir)
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(env_path) = std::env::var("PIDSCOPE_CONFIG") {
        return Ok(expand_tilde(&env_path));
    }

    if let Some(config_dir) = dirs::config_dir() {
        return Ok(config_dir.join("pidscope").join("config.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        return Ok(home.join(".pidscope").join("config.toml"));
    }

    Err(Error::Config(
        "Could not determine config path: no HOME directory or config directory found"
            .to_string(),
    ))
}

/// Expand tilde (~) in paths to the user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    PathBuf::from(path)
}

/// A package to install into the engine, resolved against the package index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    /// Bare name for the engine's default index, or a URL under the configured origin
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,

    /// Origin serving package archives under `<origin>/packages/`
    #[serde(default)]
    pub package_index: Option<String>,

    /// Directory holding `split-bbl.py` and `analyze-one-flight.py`
    #[serde(default)]
    pub scripts_dir: Option<PathBuf>,
}

fn default_packages() -> Vec<String> {
    DEFAULT_PACKAGES.iter().map(|name| name.to_string()).collect()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            packages: default_packages(),
            package_index: None,
            scripts_dir: None,
        }
    }
}

impl RuntimeConfig {
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: RuntimeConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn package_specs(&self) -> Vec<PackageSpec> {
        let origin = self
            .package_index
            .as_deref()
            .map(|origin| origin.trim_end_matches('/'));

        self.packages
            .iter()
            .map(|name| PackageSpec {
                name: name.clone(),
                location: match origin {
                    Some(origin) => format!("{}/packages/{}", origin, name),
                    None => name.clone(),
                },
            })
            .collect()
    }

    pub fn script_library(&self) -> ScriptLibrary {
        ScriptLibrary::new(self.scripts_dir.clone())
    }
}
