// Checkpoint persistence
//
// The resolved output is always the full product table: original columns
// untouched, results written into the code (or description) column, plus a
// tier column for audit. Every write replaces the file atomically.

use std::path::PathBuf;

use ncm_config::settings::{DEFAULT_CODE_HEADER, DEFAULT_DESCRIPTION_HEADER};
use ncm_config::OutputSettings;
use ncm_recon::{MatchTier, ProductRecord, ReconError, RecordSink};

use crate::load::ProductTable;
use crate::table::Table;

/// Column that records how each row's result was obtained.
pub const TIER_HEADER: &str = "MATCH_TIER";

/// Which product column results are written into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Codes,
    Descriptions,
}

pub struct TablePersister {
    /// Products as loaded, for the pending file
    source: Table,
    /// Products with the result columns ensured
    base: Table,
    target_col: usize,
    tier_col: Option<usize>,
    mode: WriteMode,
    resolved_path: PathBuf,
    pending_path: PathBuf,
}

impl TablePersister {
    pub fn new(products: &ProductTable, mode: WriteMode, output: &OutputSettings) -> Self {
        let source = products.table.clone();
        let mut base = source.clone();
        let target_col = match mode {
            WriteMode::Codes => products.columns.code.unwrap_or_else(|| {
                base.ensure_column(products.source.code_column.as_deref().unwrap_or(DEFAULT_CODE_HEADER))
            }),
            WriteMode::Descriptions => products.columns.description.unwrap_or_else(|| {
                base.ensure_column(
                    products
                        .source
                        .description_column
                        .as_deref()
                        .unwrap_or(DEFAULT_DESCRIPTION_HEADER),
                )
            }),
        };
        let tier_col = Some(base.ensure_column(TIER_HEADER));

        Self {
            source,
            base,
            target_col,
            tier_col,
            mode,
            resolved_path: output.resolved.clone(),
            pending_path: output.pending.clone(),
        }
    }

    /// Leave the tier column out (merge output carries no tiers).
    pub fn without_tier_column(mut self) -> Self {
        if let Some(col) = self.tier_col.take() {
            if col + 1 == self.base.headers.len() && col >= self.source.headers.len() {
                self.base.headers.pop();
            }
        }
        self
    }

    /// The output table for the current record state.
    ///
    /// Records never evaluated (no tier yet) keep their original cells. In
    /// code mode an evaluated record without a code gets an empty code cell,
    /// so a rejected code never survives into the output.
    pub fn render(&self, records: &[ProductRecord]) -> Table {
        let mut out = self.base.clone();
        for rec in records {
            match self.mode {
                WriteMode::Codes => match &rec.resolved_code {
                    Some(code) => out.set_cell(rec.row, self.target_col, code.as_str()),
                    None if rec.tier == Some(MatchTier::None) => {
                        out.set_cell(rec.row, self.target_col, "")
                    }
                    None => {}
                },
                WriteMode::Descriptions => {
                    if let Some(text) = &rec.resolved_description {
                        out.set_cell(rec.row, self.target_col, text.as_str());
                    }
                }
            }
            if let (Some(col), Some(tier)) = (self.tier_col, rec.tier) {
                out.set_cell(rec.row, col, tier.as_str());
            }
        }
        out
    }
}

impl RecordSink for TablePersister {
    fn checkpoint(&mut self, records: &[ProductRecord]) -> Result<(), ReconError> {
        self.render(records).save(&self.resolved_path)?;
        log::debug!("saved {}", self.resolved_path.display());
        Ok(())
    }

    fn pending(&mut self, records: &[ProductRecord]) -> Result<(), ReconError> {
        let table = self.source.select_rows(records.iter().map(|r| r.row));
        table.save(&self.pending_path)?;
        log::info!(
            "{} pending record(s) written to {}",
            table.len(),
            self.pending_path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::load_products;
    use ncm_config::ProductSource;
    use ncm_recon::NcmCode;
    use std::fs;
    use tempfile::tempdir;

    fn setup(content: &str, mode: WriteMode) -> (tempfile::TempDir, ProductTable, Vec<ProductRecord>, OutputSettings) {
        let dir = tempdir().unwrap();
        let input = dir.path().join("produtos.csv");
        fs::write(&input, content).unwrap();
        let (products, records) = load_products(&ProductSource::new(&input), mode).unwrap();
        let output = OutputSettings::for_resolved(dir.path().join("final.csv"));
        (dir, products, records, output)
    }

    #[test]
    fn codes_written_and_rejected_codes_cleared() {
        let (_dir, products, mut records, output) =
            setup("Produto,NCM\nCavalo,0101.21.00\nPonei,01012100\nNotebook,\n", WriteMode::Codes);
        records[0].resolved_code = NcmCode::parse("01012100");
        records[0].tier = Some(MatchTier::ExactValid);
        records[1].tier = Some(MatchTier::None);

        let mut sink = TablePersister::new(&products, WriteMode::Codes, &output);
        sink.checkpoint(&records).unwrap();

        let content = fs::read_to_string(&output.resolved).unwrap();
        assert_eq!(
            content,
            "Produto,NCM,MATCH_TIER\nCavalo,01012100,EXACT_VALID\nPonei,,NONE\nNotebook,,\n"
        );
    }

    #[test]
    fn missing_code_column_is_added() {
        let (_dir, products, mut records, output) = setup("Produto\nCavalo\n", WriteMode::Codes);
        records[0].resolved_code = NcmCode::parse("01012100");
        records[0].tier = Some(MatchTier::ExactDescription);

        let sink = TablePersister::new(&products, WriteMode::Codes, &output);
        let table = sink.render(&records);
        assert_eq!(table.headers, vec!["Produto", "NCM", "MATCH_TIER"]);
        assert_eq!(table.cell(0, 1), "01012100");
    }

    #[test]
    fn descriptions_fill_only_resolved_rows() {
        let (_dir, products, mut records, output) =
            setup("Produto,NCM,Descricao\nA,12030099,\nB,84713012,Já tem\n", WriteMode::Descriptions);
        records[0].resolved_description = Some("Copra".into());
        records[0].tier = Some(MatchTier::Prefix6);

        let sink = TablePersister::new(&products, WriteMode::Descriptions, &output);
        let table = sink.render(&records);
        assert_eq!(table.cell(0, 2), "Copra");
        assert_eq!(table.cell(0, 3), "PREFIX_6");
        assert_eq!(table.cell(1, 2), "Já tem");
    }

    #[test]
    fn pending_keeps_original_rows() {
        let (_dir, products, mut records, output) =
            setup("Produto,NCM\nCavalo,01012100\nWidget,99\n", WriteMode::Codes);
        records[1].tier = Some(MatchTier::None);

        let mut sink = TablePersister::new(&products, WriteMode::Codes, &output);
        sink.pending(&records[1..]).unwrap();

        let content = fs::read_to_string(&output.pending).unwrap();
        assert_eq!(content, "Produto,NCM\nWidget,99\n");
    }

    #[test]
    fn merge_output_has_no_tier_column() {
        let (_dir, products, mut records, output) = setup("Produto,NCM\nCavalo,\n", WriteMode::Codes);
        records[0].resolved_code = NcmCode::parse("01012100");

        let sink = TablePersister::new(&products, WriteMode::Codes, &output).without_tier_column();
        let table = sink.render(&records);
        assert_eq!(table.headers, vec!["Produto", "NCM"]);
        assert_eq!(table.cell(0, 1), "01012100");
    }

    #[test]
    fn unwritable_destination_is_a_persistence_error() {
        let (dir, products, records, _) = setup("Produto,NCM\nCavalo,\n", WriteMode::Codes);
        let output = OutputSettings::for_resolved(dir.path().join("missing-dir").join("final.csv"));

        let mut sink = TablePersister::new(&products, WriteMode::Codes, &output);
        let err = sink.checkpoint(&records).unwrap_err();
        assert!(matches!(err, ReconError::Persistence { .. }), "{err}");
    }
}
