// Spreadsheet tables
//
// Import: xlsx, xlsm, xls, xlsb, ods via calamine. One worksheet, first row as
//         headers, every cell converted to text.
// Export: xlsx only. All cells written as strings so codes keep leading zeros.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook};

use crate::error::IoError;
use crate::table::Table;

pub fn read(path: &Path, sheet: Option<&str>) -> Result<Table, IoError> {
    let mut workbook: Sheets<_> = open_workbook_auto(path).map_err(|e| IoError::Open {
        path: path.to_path_buf(),
        message: format!("Failed to open Excel file: {e}"),
    })?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let sheet_name = match sheet {
        Some(name) => sheet_names
            .iter()
            .find(|s| s.as_str() == name)
            .cloned()
            .ok_or_else(|| IoError::NoSheet {
                path: path.to_path_buf(),
                sheet: name.to_string(),
            })?,
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| IoError::Empty { path: path.to_path_buf() })?,
    };

    let range = workbook.worksheet_range(&sheet_name).map_err(|e| IoError::Open {
        path: path.to_path_buf(),
        message: format!("Failed to read sheet '{sheet_name}': {e}"),
    })?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(cells) => cells.iter().map(|c| cell_text(c).0.trim().to_string()).collect(),
        None => return Err(IoError::Empty { path: path.to_path_buf() }),
    };

    let mut table = Table::new(headers, Vec::new());
    for cells in rows {
        let converted: Vec<(String, bool)> = cells.iter().map(cell_text).collect();
        if converted.iter().all(|(text, _)| text.trim().is_empty()) {
            continue;
        }
        let row = table.rows.len();
        let mut values = Vec::with_capacity(converted.len());
        for (col, (text, numeric)) in converted.into_iter().enumerate() {
            if numeric {
                table.mark_numeric(row, col);
            }
            values.push(text);
        }
        table.rows.push(values);
    }

    log::debug!("{}: read sheet '{sheet_name}'", path.display());
    Ok(table)
}

/// Text of a cell and whether it was numeric.
fn cell_text(cell: &Data) -> (String, bool) {
    match cell {
        Data::Empty => (String::new(), false),
        Data::String(s) => (s.clone(), false),
        Data::Float(n) => {
            // Integers without decimals
            let text = if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{n}")
            };
            (text, true)
        }
        Data::Int(n) => (format!("{n}"), true),
        Data::Bool(b) => ((if *b { "TRUE" } else { "FALSE" }).to_string(), false),
        Data::Error(e) => (format!("#{e:?}"), false),
        Data::DateTime(dt) => (format!("{}", dt.as_f64()), false),
        Data::DateTimeIso(s) => (s.clone(), false),
        Data::DurationIso(s) => (s.clone(), false),
    }
}

pub fn write(table: &Table, path: &Path) -> Result<(), IoError> {
    let write_err = |e: rust_xlsxwriter::XlsxError| IoError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut workbook = XlsxWorkbook::new();
    let worksheet = workbook.add_worksheet();
    let header_format = Format::new().set_bold();

    for (row_idx, cells) in table.padded_rows().enumerate() {
        let row32 = row_idx as u32;
        for (col_idx, value) in cells.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let col16 = col_idx as u16;
            if row_idx == 0 {
                worksheet
                    .write_string_with_format(row32, col16, *value, &header_format)
                    .map_err(write_err)?;
            } else {
                worksheet.write_string(row32, col16, *value).map_err(write_err)?;
            }
        }
    }
    worksheet.set_freeze_panes(1, 0).map_err(write_err)?;

    workbook.save(path).map_err(write_err)
}
