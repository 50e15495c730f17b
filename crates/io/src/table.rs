// In-memory table: one header row plus data rows of text cells.
//
// Both CSV and spreadsheet files load into this shape. Every value is kept as
// text; the only type information retained is which cells were numeric in
// the source, so code columns can undo Excel's leading-zero loss.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use ncm_config::ColumnRule;
use ncm_recon::normalize::normalize_text;
use ncm_recon::ReconError;

use crate::error::IoError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// (row, col) of cells that held a number in the source spreadsheet
    numeric: HashSet<(usize, usize)>,
    /// Field delimiter for CSV output; the sniffed one when loaded from CSV
    pub delimiter: u8,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            rows: Vec::new(),
            numeric: HashSet::new(),
            delimiter: b',',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    Spreadsheet,
}

fn format_of(path: &Path) -> Option<Format> {
    let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
    match ext.as_str() {
        "csv" | "tsv" | "txt" => Some(Format::Csv),
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(Format::Spreadsheet),
        _ => None,
    }
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows, ..Default::default() }
    }

    /// Load a table, choosing the reader by file extension. `sheet` is
    /// ignored for CSV.
    pub fn load(path: &Path, sheet: Option<&str>) -> Result<Self, IoError> {
        let table = match format_of(path) {
            Some(Format::Csv) => crate::csv::read(path)?,
            Some(Format::Spreadsheet) => crate::xlsx::read(path, sheet)?,
            None => return Err(IoError::Unsupported { path: path.to_path_buf() }),
        };
        log::debug!(
            "loaded {}: {} column(s), {} row(s)",
            path.display(),
            table.headers.len(),
            table.rows.len()
        );
        Ok(table)
    }

    /// Write the table to `path` through a temporary file in the same
    /// directory, so readers never see a half-written file.
    pub fn save(&self, path: &Path) -> Result<(), IoError> {
        let format = format_of(path).ok_or_else(|| IoError::Unsupported { path: path.to_path_buf() })?;
        let tmp_path = tmp_path_for(path);
        let written = match format {
            Format::Csv => crate::csv::write(self, &tmp_path),
            Format::Spreadsheet => crate::xlsx::write(self, &tmp_path),
        };
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
        fs::rename(&tmp_path, path).map_err(|e| IoError::Write {
            path: path.to_path_buf(),
            message: format!("failed to rename tmp to output: {e}"),
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell text, or "" past the end of a short row.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Cell text read as a code. A numeric cell with an odd digit count
    /// lost its leading zero to the spreadsheet (every hierarchy level has
    /// an even length) and gets it back.
    pub fn code_cell(&self, row: usize, col: usize) -> String {
        let text = self.cell(row, col).trim();
        if self.numeric.contains(&(row, col))
            && !text.is_empty()
            && text.len() % 2 == 1
            && text.bytes().all(|b| b.is_ascii_digit())
        {
            format!("0{text}")
        } else {
            text.to_string()
        }
    }

    pub fn set_cell(&mut self, row: usize, col: usize, value: impl Into<String>) {
        if row >= self.rows.len() {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if col >= cells.len() {
            cells.resize(col + 1, String::new());
        }
        cells[col] = value.into();
        self.numeric.remove(&(row, col));
    }

    pub(crate) fn mark_numeric(&mut self, row: usize, col: usize) {
        self.numeric.insert((row, col));
    }

    /// Locate a column: the configured header (exact, then normalized), or
    /// failing that the first header containing a hint, hints tried in
    /// order.
    pub fn find_column(&self, rule: &ColumnRule) -> Option<usize> {
        let normalized: Vec<String> = self.headers.iter().map(|h| normalize_text(h)).collect();

        if let Some(name) = &rule.explicit {
            return self
                .headers
                .iter()
                .position(|h| h.trim() == name.trim())
                .or_else(|| {
                    let wanted = normalize_text(name);
                    normalized.iter().position(|h| *h == wanted)
                });
        }

        rule.hints
            .iter()
            .find_map(|hint| normalized.iter().position(|h| h.contains(*hint)))
    }

    /// [`Table::find_column`], failing with `MissingColumn`.
    pub fn column(&self, rule: &ColumnRule, table: &str) -> Result<usize, ReconError> {
        self.find_column(rule).ok_or_else(|| ReconError::MissingColumn {
            table: table.to_string(),
            column: match &rule.explicit {
                Some(name) => name.clone(),
                None => format!("{} (header containing {})", rule.role, rule.hints.join("/")),
            },
        })
    }

    /// Index of the column with this exact header, appending it if absent.
    pub fn ensure_column(&mut self, header: &str) -> usize {
        match self.headers.iter().position(|h| h == header) {
            Some(i) => i,
            None => {
                self.headers.push(header.to_string());
                self.headers.len() - 1
            }
        }
    }

    /// A new table with the same headers holding only the given rows.
    pub fn select_rows(&self, rows: impl IntoIterator<Item = usize>) -> Table {
        let mut out = Table {
            headers: self.headers.clone(),
            delimiter: self.delimiter,
            ..Default::default()
        };
        for row in rows {
            if let Some(cells) = self.rows.get(row) {
                out.rows.push(cells.clone());
            }
        }
        out
    }

    /// Header row followed by data rows, each padded to the header width.
    pub(crate) fn padded_rows(&self) -> impl Iterator<Item = Vec<&str>> + '_ {
        let width = self
            .rows
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(self.headers.len());
        std::iter::once(&self.headers).chain(self.rows.iter()).map(move |r| {
            let mut cells: Vec<&str> = r.iter().map(String::as_str).collect();
            cells.resize(width, "");
            cells
        })
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_extension(format!("{ext}.tmp"))
}
