use std::fmt;
use std::path::PathBuf;

use ncm_recon::ReconError;

#[derive(Debug)]
pub enum IoError {
    /// File missing, unreadable, or not a valid table.
    Open { path: PathBuf, message: String },
    /// Requested worksheet does not exist.
    NoSheet { path: PathBuf, sheet: String },
    /// File has no header row.
    Empty { path: PathBuf },
    Unsupported { path: PathBuf },
    Write { path: PathBuf, message: String },
    /// Resume table does not line up with the products table.
    RowMismatch { path: PathBuf, expected: usize, found: usize },
    /// Column mapping failure and other engine-level errors.
    Recon(ReconError),
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, message } => {
                write!(f, "cannot open '{}': {message}", path.display())
            }
            Self::NoSheet { path, sheet } => {
                write!(f, "'{}' has no sheet named '{sheet}'", path.display())
            }
            Self::Empty { path } => write!(f, "'{}' has no header row", path.display()),
            Self::Unsupported { path } => {
                write!(f, "unsupported file type: '{}'", path.display())
            }
            Self::Write { path, message } => {
                write!(f, "cannot write '{}': {message}", path.display())
            }
            Self::RowMismatch { path, expected, found } => write!(
                f,
                "'{}' has {found} data row(s), expected {expected}",
                path.display()
            ),
            Self::Recon(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for IoError {}

impl From<ReconError> for IoError {
    fn from(e: ReconError) -> Self {
        Self::Recon(e)
    }
}

impl From<IoError> for ReconError {
    fn from(e: IoError) -> Self {
        match e {
            IoError::Recon(inner) => inner,
            IoError::Write { path, message } => ReconError::Persistence {
                destination: path.display().to_string(),
                message,
            },
            other => ReconError::Persistence {
                destination: String::new(),
                message: other.to_string(),
            },
        }
    }
}
