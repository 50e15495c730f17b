//! Fill missing codes in one product table from another, already reconciled,
//! table keyed by normalized product name.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{NcmCode, ProductRecord};
use crate::normalize::normalize_text;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub total: usize,
    /// Empty codes filled from the source table.
    pub filled: usize,
    /// Records that already had a code and were left alone.
    pub kept: usize,
    /// Empty codes with no usable counterpart in the source.
    pub unmatched: usize,
    /// Source rows ignored because an earlier row had the same name.
    pub duplicate_names: usize,
}

/// Copy codes from `source` into the records of `target` whose code cell is
/// empty. Existing codes are never overwritten. When a name appears more
/// than once in `source`, the first row with a parseable code wins.
pub fn merge_codes(target: &mut [ProductRecord], source: &[ProductRecord]) -> MergeSummary {
    let mut by_name: HashMap<String, NcmCode> = HashMap::new();
    let mut summary = MergeSummary { total: target.len(), ..Default::default() };

    for rec in source {
        let key = normalize_text(&rec.name);
        if key.is_empty() {
            continue;
        }
        let Some(code) = rec
            .resolved_code
            .clone()
            .or_else(|| NcmCode::parse(&rec.current_code))
        else {
            continue;
        };
        if by_name.contains_key(&key) {
            summary.duplicate_names += 1;
            continue;
        }
        by_name.insert(key, code);
    }

    for rec in target.iter_mut() {
        if !rec.current_code.trim().is_empty() || rec.resolved_code.is_some() {
            summary.kept += 1;
            continue;
        }
        match by_name.get(&normalize_text(&rec.name)) {
            Some(code) => {
                log::debug!("row {}: merged code {code}", rec.row);
                rec.resolved_code = Some(code.clone());
                summary.filled += 1;
            }
            None => summary.unmatched += 1,
        }
    }

    log::info!(
        "merge: {} filled, {} kept, {} unmatched",
        summary.filled,
        summary.kept,
        summary.unmatched
    );
    summary
}
