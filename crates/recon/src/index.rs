//! In-memory lookup structures over the authoritative NCM table.
//!
//! Built once per run and read-only afterwards; every evaluation borrows it
//! immutably.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::model::{NcmCode, ReferenceEntry};
use crate::normalize::{leading_tokens, normalize_code, normalize_text, CODE_LEN};

/// Prefix lengths indexed for hierarchical fallback, finest first.
pub const PREFIX_LEVELS: [usize; 3] = [6, 4, 2];

/// Two table rows with the same description but different codes.
/// The later row wins in the description map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptionConflict {
    pub description: String,
    pub kept: NcmCode,
    pub overwritten: NcmCode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub rows: usize,
    pub distinct_codes: usize,
    /// Rows with an empty or overlong code, or an empty description.
    pub malformed_rows: usize,
    pub conflicts: Vec<DescriptionConflict>,
}

#[derive(Debug, Default)]
pub struct ReferenceIndex {
    entries: Vec<ReferenceEntry>,
    /// Distinct codes in table order.
    codes: Vec<NcmCode>,
    valid: HashSet<NcmCode>,
    by_description: HashMap<String, NcmCode>,
    pairs: HashSet<(String, NcmCode)>,
    /// Entry index of the first row carrying each code.
    first_entry: HashMap<NcmCode, usize>,
    /// For each of `PREFIX_LEVELS`: prefix → position in `codes` of the
    /// first code (table order) sharing it.
    prefixes: [HashMap<String, usize>; 3],
    stats: IndexStats,
}

impl ReferenceIndex {
    /// Build the index from raw `(code, description)` cells.
    ///
    /// Malformed rows are skipped and counted. Duplicate descriptions are
    /// last-write-wins; each overwrite with a different code is recorded in
    /// [`IndexStats::conflicts`].
    pub fn build<I, C, D>(rows: I) -> Self
    where
        I: IntoIterator<Item = (C, D)>,
        C: AsRef<str>,
        D: AsRef<str>,
    {
        let mut index = Self::default();

        for (raw_code, raw_description) in rows {
            index.stats.rows += 1;
            // A reference code must fit in eight digits; only product
            // codes are truncated.
            let code = Some(raw_code.as_ref())
                .filter(|raw| normalize_code(raw).len() <= CODE_LEN)
                .and_then(NcmCode::parse);
            let description = normalize_text(raw_description.as_ref());
            let code = match code {
                Some(code) if !description.is_empty() => code,
                _ => {
                    index.stats.malformed_rows += 1;
                    log::debug!(
                        "reference row {}: skipped (code '{}', description '{}')",
                        index.stats.rows,
                        raw_code.as_ref(),
                        raw_description.as_ref(),
                    );
                    continue;
                }
            };

            index.insert(ReferenceEntry {
                code,
                description,
                label: raw_description.as_ref().trim().to_string(),
            });
        }

        index.stats.distinct_codes = index.codes.len();

        if index.stats.malformed_rows > 0 {
            log::warn!(
                "reference table: skipped {} malformed row(s)",
                index.stats.malformed_rows
            );
        }
        if !index.stats.conflicts.is_empty() {
            log::warn!(
                "reference table: {} description(s) map to more than one code; the last row wins",
                index.stats.conflicts.len()
            );
        }
        log::info!(
            "reference index: {} codes, {} descriptions",
            index.codes.len(),
            index.by_description.len()
        );

        index
    }

    fn insert(&mut self, entry: ReferenceEntry) {
        let entry_idx = self.entries.len();

        if self.valid.insert(entry.code.clone()) {
            let code_idx = self.codes.len();
            for (level, len) in PREFIX_LEVELS.iter().enumerate() {
                self.prefixes[level]
                    .entry(entry.code.prefix(*len).to_string())
                    .or_insert(code_idx);
            }
            self.codes.push(entry.code.clone());
            self.first_entry.insert(entry.code.clone(), entry_idx);
        }

        if let Some(previous) = self
            .by_description
            .insert(entry.description.clone(), entry.code.clone())
        {
            if previous != entry.code {
                log::debug!(
                    "description '{}': {} overwritten by {}",
                    entry.description,
                    previous,
                    entry.code
                );
                self.stats.conflicts.push(DescriptionConflict {
                    description: entry.description.clone(),
                    kept: entry.code.clone(),
                    overwritten: previous,
                });
            }
        }

        self.pairs
            .insert((entry.description.clone(), entry.code.clone()));
        self.entries.push(entry);
    }

    pub fn is_valid(&self, code: &NcmCode) -> bool {
        self.valid.contains(code)
    }

    pub fn is_valid_pair(&self, normalized_description: &str, code: &NcmCode) -> bool {
        // Cheap reject before allocating the owned tuple key.
        if !self.valid.contains(code) {
            return false;
        }
        self.pairs
            .contains(&(normalized_description.to_string(), code.clone()))
    }

    pub fn code_for_description(&self, normalized_description: &str) -> Option<&NcmCode> {
        self.by_description.get(normalized_description)
    }

    /// First code (table order) whose leading `len` digits equal `prefix`.
    /// `len` must be one of [`PREFIX_LEVELS`].
    pub fn first_with_prefix(&self, prefix: &str) -> Option<&NcmCode> {
        let level = PREFIX_LEVELS.iter().position(|l| *l == prefix.len())?;
        self.prefixes[level].get(prefix).map(|i| &self.codes[*i])
    }

    /// Description label of the first row carrying `code`.
    pub fn label(&self, code: &NcmCode) -> Option<&str> {
        self.first_entry
            .get(code)
            .map(|i| self.entries[*i].label.as_str())
    }

    /// Grounding examples for the classifier: entries whose normalized
    /// description contains any of the first `tokens` words of the product
    /// name, in table order, at most `limit` of them.
    pub fn candidates(&self, normalized_name: &str, tokens: usize, limit: usize) -> Vec<&ReferenceEntry> {
        let words = leading_tokens(normalized_name, tokens);
        if words.is_empty() || limit == 0 {
            return Vec::new();
        }
        self.entries
            .iter()
            .filter(|e| words.iter().any(|w| e.description.contains(w)))
            .take(limit)
            .collect()
    }

    /// Distinct valid codes in table order.
    pub fn codes(&self) -> &[NcmCode] {
        &self.codes
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> NcmCode {
        NcmCode::parse(s).unwrap()
    }

    fn horses() -> ReferenceIndex {
        ReferenceIndex::build([
            ("0101.21.00", "Cavalos reprodutores de raça pura"),
            ("0101.29.00", "Outros cavalos"),
            ("0102.21.10", "Bovinos prenhes"),
        ])
    }

    #[test]
    fn build_registers_codes_and_descriptions() {
        let index = horses();
        assert_eq!(index.codes().len(), 3);
        assert!(index.is_valid(&code("01012100")));
        assert_eq!(
            index.code_for_description("CAVALOS REPRODUTORES DE RACA PURA"),
            Some(&code("01012100"))
        );
        assert!(index.is_valid_pair("OUTROS CAVALOS", &code("01012900")));
        assert!(!index.is_valid_pair("OUTROS CAVALOS", &code("01012100")));
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let index = ReferenceIndex::build([
            ("", "sem codigo"),
            ("0101.21.00", "   "),
            ("abc", "letras"),
            ("0101.21.00.9", "dígitos demais"),
            ("01012900", "Outros cavalos"),
        ]);
        assert_eq!(index.stats().rows, 5);
        assert_eq!(index.stats().malformed_rows, 4);
        assert_eq!(index.stats().distinct_codes, 1);
        assert_eq!(index.codes(), &[code("01012900")]);
    }

    #[test]
    fn duplicate_description_last_wins_and_is_recorded() {
        let index = ReferenceIndex::build([
            ("01012100", "Outros"),
            ("01019000", "Outros"),
        ]);
        assert_eq!(index.code_for_description("OUTROS"), Some(&code("01019000")));
        assert_eq!(index.stats().conflicts.len(), 1);
        assert_eq!(index.stats().conflicts[0].overwritten, code("01012100"));
        // Both pairs stay valid for validation.
        assert!(index.is_valid_pair("OUTROS", &code("01012100")));
    }

    #[test]
    fn duplicate_code_rows_keep_first_label() {
        let index = ReferenceIndex::build([
            ("01012100", "Primeira"),
            ("01012100", "Segunda"),
        ]);
        assert_eq!(index.codes().len(), 1);
        assert_eq!(index.label(&code("01012100")), Some("Primeira"));
        assert!(index.stats().conflicts.is_empty());
    }

    #[test]
    fn prefix_lookup_uses_table_order() {
        let index = ReferenceIndex::build([
            ("01029000", "B"),
            ("01021000", "A"),
        ]);
        assert_eq!(index.first_with_prefix("0102"), Some(&code("01029000")));
        assert_eq!(index.first_with_prefix("01"), Some(&code("01029000")));
        assert_eq!(index.first_with_prefix("010210"), Some(&code("01021000")));
        assert_eq!(index.first_with_prefix("999"), None);
    }

    #[test]
    fn candidates_match_leading_tokens() {
        let index = horses();
        let found = index.candidates("CAVALOS ARABES", 2, 10);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].code, code("01012100"));

        // Third token is ignored.
        assert!(index.candidates("XYZ QWE BOVINOS", 2, 10).is_empty());
        assert_eq!(index.candidates("BOVINOS", 2, 10).len(), 1);
    }

    #[test]
    fn candidates_respect_limit() {
        let rows: Vec<(String, String)> = (0..30)
            .map(|i| (format!("8471{i:04}"), format!("Maquina {i}")))
            .collect();
        let index = ReferenceIndex::build(rows);
        assert_eq!(index.candidates("MAQUINA DE LAVAR", 2, 10).len(), 10);
        assert!(index.candidates("", 2, 10).is_empty());
    }
}
