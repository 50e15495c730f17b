// Reference and product loading
//
// Column mapping is resolved once per table at load time; a column that
// cannot be found fails the load before any record is evaluated.

use std::path::Path;

use ncm_config::{ProductSource, ReferenceSource};
use ncm_recon::{MatchTier, NcmCode, ProductRecord, ReconError, ReferenceIndex};

use crate::error::IoError;
use crate::persist::{WriteMode, TIER_HEADER};
use crate::table::Table;

// ---------------------------------------------------------------------------
// Reference table
// ---------------------------------------------------------------------------

pub fn load_reference(source: &ReferenceSource) -> Result<ReferenceIndex, IoError> {
    let table = Table::load(&source.file, source.sheet.as_deref())?;
    let code_col = table.column(&source.code_rule(), "reference")?;
    let desc_col = table.column(&source.description_rule(), "reference")?;
    if code_col == desc_col {
        return Err(ReconError::MissingColumn {
            table: "reference".into(),
            column: format!("description (distinct from '{}')", table.headers[code_col]),
        }
        .into());
    }
    log::info!(
        "reference table {}: code column '{}', description column '{}'",
        source.file.display(),
        table.headers[code_col],
        table.headers[desc_col]
    );

    let rows = (0..table.len()).map(|r| (table.code_cell(r, code_col), table.cell(r, desc_col)));
    let index = ReferenceIndex::build(rows);
    if index.is_empty() {
        log::warn!("reference table {} yielded no valid codes", source.file.display());
    }
    Ok(index)
}

// ---------------------------------------------------------------------------
// Product table
// ---------------------------------------------------------------------------

/// Resolved column positions in a product table. Optional columns are
/// created by the persister when results need them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductColumns {
    pub name: Option<usize>,
    pub code: Option<usize>,
    pub description: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ProductTable {
    pub source: ProductSource,
    pub table: Table,
    pub columns: ProductColumns,
}

/// Load products and build one record per data row.
///
/// `Codes` needs a name column; the code column is optional (an absent one
/// reads as empty). `Descriptions` needs a code column; the name column is
/// only used for logging.
pub fn load_products(
    source: &ProductSource,
    mode: WriteMode,
) -> Result<(ProductTable, Vec<ProductRecord>), IoError> {
    let table = Table::load(&source.file, source.sheet.as_deref())?;

    let columns = match mode {
        WriteMode::Codes => ProductColumns {
            name: Some(table.column(&source.name_rule(), "products")?),
            code: table.find_column(&source.code_rule()),
            description: None,
        },
        WriteMode::Descriptions => ProductColumns {
            name: table.find_column(&source.name_rule()),
            code: Some(table.column(&source.code_rule(), "products")?),
            description: table.find_column(&source.description_rule()),
        },
    };
    if mode == WriteMode::Codes && columns.code.is_none() {
        log::info!("products table has no code column; one will be added");
    }

    let records = (0..table.len())
        .map(|r| {
            let mut rec = ProductRecord::new(
                r,
                columns.name.map(|c| table.cell(r, c).trim()).unwrap_or(""),
                columns.code.map(|c| table.code_cell(r, c)).unwrap_or_default(),
            );
            if let Some(c) = columns.description {
                rec.current_description = table.cell(r, c).trim().to_string();
            }
            rec
        })
        .collect();

    Ok((ProductTable { source: source.clone(), table, columns }, records))
}

// ---------------------------------------------------------------------------
// Resume
// ---------------------------------------------------------------------------

/// Carry results over from an earlier run's output at `previous`.
///
/// Rows are matched by position, so the previous output must have exactly
/// as many data rows as the products table. A row is carried only when its
/// tier column records a match and, for codes, the code is still valid in
/// `index`. Returns how many records were carried.
pub fn apply_resume(
    records: &mut [ProductRecord],
    previous: &Path,
    products: &ProductTable,
    mode: WriteMode,
    index: &ReferenceIndex,
) -> Result<usize, IoError> {
    // Outputs are written with a single worksheet.
    let table = Table::load(previous, None)?;
    if table.len() != records.len() {
        return Err(IoError::RowMismatch {
            path: previous.to_path_buf(),
            expected: records.len(),
            found: table.len(),
        });
    }

    let Some(tier_col) = table.headers.iter().position(|h| h == TIER_HEADER) else {
        log::warn!(
            "{} has no {TIER_HEADER} column; nothing to resume",
            previous.display()
        );
        return Ok(0);
    };
    let rule = match mode {
        WriteMode::Codes => products.source.code_rule(),
        WriteMode::Descriptions => products.source.description_rule(),
    };
    let Some(value_col) = table.find_column(&rule) else {
        return Ok(0);
    };

    let mut carried = 0;
    for rec in records.iter_mut() {
        let Some(tier) = MatchTier::parse(table.cell(rec.row, tier_col)).filter(|t| t.is_match()) else {
            continue;
        };
        match mode {
            WriteMode::Codes => {
                let code = NcmCode::parse(&table.code_cell(rec.row, value_col));
                if let Some(code) = code.filter(|c| index.is_valid(c)) {
                    rec.resolved_code = Some(code);
                    rec.tier = Some(tier);
                    carried += 1;
                }
            }
            WriteMode::Descriptions => {
                let text = table.cell(rec.row, value_col).trim();
                if !text.is_empty() && rec.current_description.is_empty() {
                    rec.resolved_description = Some(text.to_string());
                    rec.tier = Some(tier);
                    carried += 1;
                }
            }
        }
    }

    log::info!("resume: carried {carried} record(s) from {}", previous.display());
    Ok(carried)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const REFERENCE: &str = "Código;Descrição\n0101.21.00;Cavalos reprodutores de raça pura\n01.01.90.00;Outros cavalos\n;Linha sem código\n8471.30.12;Computadores portáteis\n";

    fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn reference_columns_found_by_hint() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "ref.csv", REFERENCE);
        let index = load_reference(&ReferenceSource::new(&path)).unwrap();

        assert_eq!(index.stats().rows, 4);
        assert_eq!(index.stats().malformed_rows, 1);
        assert!(index.is_valid(&NcmCode::parse("01019000").unwrap()));
        assert_eq!(
            index.code_for_description("COMPUTADORES PORTATEIS"),
            NcmCode::parse("84713012").as_ref()
        );
    }

    #[test]
    fn reference_missing_column() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "ref.csv", "Código;Unidade\n01012100;UN\n");
        let err = load_reference(&ReferenceSource::new(&path)).unwrap_err();
        assert!(matches!(err, IoError::Recon(ReconError::MissingColumn { .. })), "{err}");
    }

    #[test]
    fn products_without_code_column() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "p.csv", "Nome do Produto,Preço\nCavalo árabe,10\nNotebook,20\n");
        let (products, records) = load_products(&ProductSource::new(&path), WriteMode::Codes).unwrap();
        assert_eq!(products.columns.name, Some(0));
        assert_eq!(products.columns.code, None);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Cavalo árabe");
        assert_eq!(records[0].current_code, "");
        assert_eq!(records[1].row, 1);
    }

    #[test]
    fn describe_mode_requires_code_column() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "p.csv", "Nome,Preço\nCavalo,10\n");
        let err = load_products(&ProductSource::new(&path), WriteMode::Descriptions).unwrap_err();
        assert!(err.to_string().contains("code"), "{err}");
    }

    #[test]
    fn describe_mode_reads_existing_descriptions() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "p.csv", "Produto,NCM,Descricao\nCavalo,01012100,\nNotebook,84713012,Notebook\n");
        let (products, records) =
            load_products(&ProductSource::new(&path), WriteMode::Descriptions).unwrap();
        assert_eq!(products.columns.description, Some(2));
        assert_eq!(records[0].current_description, "");
        assert_eq!(records[1].current_description, "Notebook");
    }

    #[test]
    fn resume_carries_only_matched_valid_rows() {
        let dir = tempdir().unwrap();
        let ref_path = write(dir.path(), "ref.csv", REFERENCE);
        let index = load_reference(&ReferenceSource::new(&ref_path)).unwrap();

        let products_path = write(dir.path(), "p.csv", "Produto,NCM\nA,\nB,\nC,\nD,\n");
        let (products, mut records) =
            load_products(&ProductSource::new(&products_path), WriteMode::Codes).unwrap();

        let previous = write(
            dir.path(),
            "prev.csv",
            "Produto,NCM,MATCH_TIER\nA,01012100,EXACT_DESCRIPTION\nB,,NONE\nC,99999999,AI_ASSISTED\nD,,\n",
        );
        let carried = apply_resume(&mut records, &previous, &products, WriteMode::Codes, &index).unwrap();

        assert_eq!(carried, 1);
        assert_eq!(records[0].resolved_code, NcmCode::parse("01012100"));
        assert_eq!(records[0].tier, Some(MatchTier::ExactDescription));
        assert!(records[1..].iter().all(|r| !r.is_resolved()));
    }

    #[test]
    fn resume_rejects_row_mismatch() {
        let dir = tempdir().unwrap();
        let ref_path = write(dir.path(), "ref.csv", REFERENCE);
        let index = load_reference(&ReferenceSource::new(&ref_path)).unwrap();
        let products_path = write(dir.path(), "p.csv", "Produto,NCM\nA,\nB,\n");
        let (products, mut records) =
            load_products(&ProductSource::new(&products_path), WriteMode::Codes).unwrap();
        let previous = write(dir.path(), "prev.csv", "Produto,NCM,MATCH_TIER\nA,01012100,EXACT_VALID\n");

        let err = apply_resume(&mut records, &previous, &products, WriteMode::Codes, &index).unwrap_err();
        assert!(matches!(err, IoError::RowMismatch { expected: 2, found: 1, .. }));
    }
}
