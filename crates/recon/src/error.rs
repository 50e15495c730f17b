use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (zero checkpoint interval, etc.).
    ConfigValidation(String),
    /// A required column could not be identified in an input table.
    MissingColumn { table: String, column: String },
    /// Destination unwritable. Fatal: checkpoints can no longer be trusted.
    Persistence { destination: String, message: String },
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { table, column } => {
                write!(f, "table '{table}': missing column '{column}'")
            }
            Self::Persistence { destination, message } => {
                write!(f, "cannot persist to '{destination}': {message}")
            }
        }
    }
}

impl std::error::Error for ReconError {}
