//! `ncm merge`: fill empty codes from a second, already reconciled table.

use std::path::PathBuf;

use ncm_config::{OutputSettings, ProductSource};
use ncm_io::{load_products, TablePersister, WriteMode};
use ncm_recon::{merge_codes, RecordSink};

use crate::exit_codes::EXIT_ERROR;
use crate::CliError;

pub fn cmd_merge(primary: PathBuf, source: PathBuf, output: PathBuf, json: bool) -> Result<(), CliError> {
    if output == primary || output == source {
        return Err(CliError::args("--output must differ from both input tables"));
    }

    let (table, mut records) =
        load_products(&ProductSource::new(&primary), WriteMode::Codes).map_err(CliError::io)?;
    let (_, donors) = load_products(&ProductSource::new(&source), WriteMode::Codes).map_err(CliError::io)?;

    let summary = merge_codes(&mut records, &donors);

    let mut sink =
        TablePersister::new(&table, WriteMode::Codes, &OutputSettings::for_resolved(&output)).without_tier_column();
    sink.checkpoint(&records).map_err(CliError::recon)?;

    if json {
        let out = serde_json::json!({
            "primary": primary.display().to_string(),
            "source": source.display().to_string(),
            "output": output.display().to_string(),
            "summary": summary,
        });
        let text = serde_json::to_string_pretty(&out).map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
        println!("{text}");
    }

    eprintln!(
        "merge: {} record(s): {} filled, {} already coded, {} unmatched ({} duplicate name(s) in source)",
        summary.total, summary.filled, summary.kept, summary.unmatched, summary.duplicate_names
    );
    eprintln!("written to {}", output.display());
    Ok(())
}
