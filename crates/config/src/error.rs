use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    Read { path: PathBuf, message: String },
    /// TOML parse / deserialization error.
    Parse(String),
    /// Semantically invalid config (missing file, bad interval, etc.).
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, message } => {
                write!(f, "cannot read config '{}': {message}", path.display())
            }
            Self::Parse(msg) => write!(f, "config parse error: {msg}"),
            Self::Validation(msg) => write!(f, "config validation error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ncm_recon::ReconError> for ConfigError {
    fn from(e: ncm_recon::ReconError) -> Self {
        match e {
            ncm_recon::ReconError::ConfigParse(msg) => Self::Parse(msg),
            other => Self::Validation(other.to_string()),
        }
    }
}
