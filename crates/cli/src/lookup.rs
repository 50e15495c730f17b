//! `ncm lookup`: hierarchical lookup of a single code.

use std::path::PathBuf;

use ncm_config::ReferenceSource;
use ncm_io::load_reference;
use ncm_recon::{match_by_prefix, PrefixMode};

use crate::exit_codes::{EXIT_ERROR, EXIT_NOT_FOUND};
use crate::CliError;

pub fn cmd_lookup(
    code: String,
    reference: PathBuf,
    sheet: Option<String>,
    raw: bool,
    json: bool,
) -> Result<(), CliError> {
    let source = ReferenceSource { sheet, ..ReferenceSource::new(reference) };
    let index = load_reference(&source).map_err(CliError::io)?;

    let mode = if raw { PrefixMode::Raw } else { PrefixMode::Canonical };
    let found = match_by_prefix(&code, &index, mode);
    let label = found.code.as_ref().and_then(|c| index.label(c));

    if json {
        let out = serde_json::json!({
            "input": code,
            "code": found.code.as_ref().map(|c| c.as_str()),
            "level": found.level,
            "tier": found.tier().as_str(),
            "description": label,
        });
        let text = serde_json::to_string_pretty(&out).map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
        println!("{text}");
    }

    match (&found.code, label) {
        (Some(c), Some(label)) => {
            if !json {
                println!("{c}\t{}\t{label}", found.tier());
            }
            Ok(())
        }
        _ => Err(CliError::new(EXIT_NOT_FOUND, format!("no reference entry for '{code}' at any level"))),
    }
}
