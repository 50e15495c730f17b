//! CLI Exit Code Registry
//!
//! Single source of truth for `ncm` exit codes. Scripts rely on them.
//!
//! | Range   | Domain     | Description                                  |
//! |---------|------------|----------------------------------------------|
//! | 0       | Universal  | Success (pending records included)           |
//! | 1       | Universal  | General error (unspecified)                  |
//! | 2       | Universal  | Usage error (bad args, missing paths)        |
//! | 3-9     | run        | Config, input, persistence and outcome codes |
//! | 10-19   | classifier | AI provider/credential codes                 |

use ncm_io::IoError;
use ncm_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

pub const EXIT_SUCCESS: u8 = 0;

/// General error. Prefer a specific code.
pub const EXIT_ERROR: u8 = 1;

pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Run (3-9)
// =============================================================================

/// Run config could not be read, parsed or validated.
pub const EXIT_CONFIG_INVALID: u8 = 3;

/// A required column is missing from the reference or products table.
pub const EXIT_MISSING_COLUMN: u8 = 4;

/// An input table could not be opened or read.
pub const EXIT_INPUT: u8 = 5;

/// An output could not be written. Earlier checkpoints are intact.
pub const EXIT_PERSISTENCE: u8 = 6;

/// Interrupted (Ctrl-C). The last checkpoint holds all finished records.
pub const EXIT_INTERRUPTED: u8 = 7;

/// Records left pending and `--fail-on-pending` was given.
pub const EXIT_PENDING: u8 = 8;

/// `lookup` found no code at any level.
pub const EXIT_NOT_FOUND: u8 = 9;

// =============================================================================
// Classifier (10-19)
// =============================================================================

/// Provider enabled but no API key in keychain or environment.
pub const EXIT_AI_MISSING_KEY: u8 = 11;

/// Gateway could not be set up (bad model, HTTP client failure).
pub const EXIT_AI_SETUP: u8 = 12;

// =============================================================================
// Error mapping
// =============================================================================

pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_CONFIG_INVALID,
        ReconError::MissingColumn { .. } => EXIT_MISSING_COLUMN,
        ReconError::Persistence { .. } => EXIT_PERSISTENCE,
    }
}

pub fn io_exit_code(err: &IoError) -> u8 {
    match err {
        IoError::Recon(inner) => recon_exit_code(inner),
        IoError::Write { .. } => EXIT_PERSISTENCE,
        IoError::Unsupported { .. } => EXIT_USAGE,
        IoError::Open { .. }
        | IoError::NoSheet { .. }
        | IoError::Empty { .. }
        | IoError::RowMismatch { .. } => EXIT_INPUT,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_column_maps_through_io() {
        let err = IoError::Recon(ReconError::MissingColumn {
            table: "products".into(),
            column: "name".into(),
        });
        assert_eq!(io_exit_code(&err), EXIT_MISSING_COLUMN);
    }

    #[test]
    fn test_write_failure_is_persistence() {
        let err = IoError::Write { path: PathBuf::from("out.csv"), message: "disk full".into() };
        assert_eq!(io_exit_code(&err), EXIT_PERSISTENCE);
    }

    #[test]
    fn test_unsupported_extension_is_usage() {
        let err = IoError::Unsupported { path: PathBuf::from("produtos.pdf") };
        assert_eq!(io_exit_code(&err), EXIT_USAGE);
    }
}
