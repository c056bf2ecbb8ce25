use std::fmt;

/// Result type for pidscope-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the runtime layer
#[derive(Debug)]
pub enum Error {
    /// Domain type could not be built
    Types(pidscope_types::Error),

    /// IO operation failed
    Io(std::io::Error),

    /// JSON parsing failed
    Json(serde_json::Error),

    /// Configuration error
    Config(String),

    /// Sandbox used before `initialize()` completed
    NotInitialized,

    /// Engine load or package installation failed; the sandbox is unusable
    Initialization(String),

    /// Path missing from a virtual file store
    FileNotFound(String),

    /// Path not addressable in a virtual file store
    InvalidPath(String),

    /// Script source could not be resolved
    ScriptNotFound(String),

    /// Blackbox decoder failed
    Decoder(String),

    /// Script outputs violate the file contract
    Protocol(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Types(err) => write!(f, "{}", err),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Json(err) => write!(f, "JSON error: {}", err),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::NotInitialized => {
                write!(f, "Sandbox not initialized: call initialize() first")
            }
            Error::Initialization(msg) => write!(f, "Sandbox initialization failed: {}", msg),
            Error::FileNotFound(path) => write!(f, "No such file in sandbox: {}", path),
            Error::InvalidPath(path) => write!(f, "Invalid sandbox path: {}", path),
            Error::ScriptNotFound(name) => write!(f, "Script not found: {}", name),
            Error::Decoder(msg) => write!(f, "Decoder error: {}", msg),
            Error::Protocol(msg) => write!(f, "Protocol error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Types(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<pidscope_types::Error> for Error {
    fn from(err: pidscope_types::Error) -> Self {
        Error::Types(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}
