// File I/O for NCM reconciliation runs

pub mod csv;
pub mod error;
pub mod load;
pub mod persist;
pub mod table;
pub mod xlsx;

use std::path::Path;

pub use error::IoError;
pub use load::{apply_resume, load_products, load_reference, ProductColumns, ProductTable};
pub use persist::{TablePersister, WriteMode, TIER_HEADER};
pub use table::Table;

/// Compute blake3 hash of a file (with algorithm prefix).
pub fn hash_file(path: &Path) -> Result<String, IoError> {
    let contents = std::fs::read(path).map_err(|e| IoError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(format!("blake3:{}", blake3::hash(&contents).to_hex()))
}
