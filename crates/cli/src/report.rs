//! JSON run report (`--json` on stdout, `[output] report` on disk).
//!
//! Shape is a contract: `schema_version` bumps on any breaking change.

use std::fs;
use std::path::Path;

use serde::Serialize;

use ncm_recon::index::IndexStats;
use ncm_recon::RunSummary;

use crate::exit_codes::EXIT_PERSISTENCE;
use crate::CliError;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub meta: ReportMeta,
    pub summary: RunSummary,
    pub reference: IndexStats,
    pub outputs: ReportOutputs,
}

#[derive(Debug, Serialize)]
pub struct ReportMeta {
    pub schema_version: u32,
    pub name: String,
    /// "codes" or "descriptions"
    pub mode: &'static str,
    pub engine_version: &'static str,
    pub started_at: String,
    pub duration_ms: u64,
    pub classifier: String,
    pub reference_file: String,
    pub reference_blake3: String,
    pub products_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resumed_from: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportOutputs {
    pub resolved: String,
    /// Absent when nothing was pending or the run was interrupted.
    pub pending: Option<String>,
}

impl RunReport {
    pub fn to_json(&self) -> Result<String, CliError> {
        serde_json::to_string_pretty(self).map_err(|e| CliError {
            code: EXIT_PERSISTENCE,
            message: format!("JSON serialization error: {e}"),
            hint: None,
        })
    }

    /// Write the report next to the outputs (tmp file, then rename).
    pub fn save(&self, path: &Path) -> Result<(), CliError> {
        let json = self.to_json()?;
        let write_err = |e: std::io::Error| CliError {
            code: EXIT_PERSISTENCE,
            message: format!("cannot write report {}: {e}", path.display()),
            hint: None,
        };
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(write_err)?;
        fs::rename(&tmp, path).map_err(write_err)
    }
}
