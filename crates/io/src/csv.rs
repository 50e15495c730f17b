// CSV/TSV tables

use std::path::Path;

use crate::error::IoError;
use crate::table::Table;

/// Read a delimited file. The first record is the header row; rows with no
/// content are dropped.
pub fn read(path: &Path) -> Result<Table, IoError> {
    let content = read_file_as_utf8(path)?;
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
    let delimiter = sniff_delimiter(content);
    parse(content, delimiter).map_err(|message| IoError::Open {
        path: path.to_path_buf(),
        message,
    })?
    .ok_or_else(|| IoError::Empty { path: path.to_path_buf() })
}

fn parse(content: &str, delimiter: u8) -> Result<Option<Table>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let headers: Vec<String> = match records.next() {
        Some(record) => record
            .map_err(|e| e.to_string())?
            .iter()
            .map(|h| h.trim().to_string())
            .collect(),
        None => return Ok(None),
    };

    let mut table = Table::new(headers, Vec::new());
    table.delimiter = delimiter;
    for result in records {
        let record = result.map_err(|e| e.to_string())?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        table.rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(Some(table))
}

const DELIMITERS: [u8; 4] = [b';', b',', b'\t', b'|'];
const SNIFF_LINES: usize = 10;

/// Guess the field delimiter from the first lines.
///
/// A candidate scores the number of sampled lines that split into as many
/// fields as the header does, times that field count. A header that does not
/// split disqualifies the candidate. Ties keep the earlier candidate, so
/// semicolon (the Brazilian Excel default) wins over comma.
fn sniff_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content.lines().take(SNIFF_LINES).collect();
    let Some((header, rest)) = sample.split_first() else {
        return b',';
    };

    DELIMITERS
        .iter()
        .filter_map(|&delim| {
            let width = field_count(header, delim);
            if width <= 1 {
                return None;
            }
            let agreeing = 1 + rest.iter().filter(|l| field_count(l, delim) == width).count();
            Some((delim, agreeing * width))
        })
        .fold(None, |best: Option<(u8, usize)>, cand| match best {
            Some(b) if b.1 >= cand.1 => Some(b),
            _ => Some(cand),
        })
        .map(|(delim, _)| delim)
        .unwrap_or(b',')
}

/// Fields in one line under `delim`, honoring quotes.
fn field_count(line: &str, delim: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delim)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(Result::ok)
        .map_or(1, |r| r.len())
}

/// File contents as UTF-8. Bytes that are not valid UTF-8 are taken as
/// Windows-1252, which is what Excel writes for "CSV (separado por vírgulas)".
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let bytes = std::fs::read(path).map_err(|e| IoError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    String::from_utf8(bytes).or_else(|e| {
        log::debug!("{}: not UTF-8, decoding as Windows-1252", path.display());
        let (text, _, _) = encoding_rs::WINDOWS_1252.decode(e.as_bytes());
        Ok(text.into_owned())
    })
}

pub fn write(table: &Table, path: &Path) -> Result<(), IoError> {
    let write_err = |e: csv::Error| IoError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let mut writer = csv::WriterBuilder::new()
        .delimiter(table.delimiter)
        .from_path(path)
        .map_err(write_err)?;

    for record in table.padded_rows() {
        writer.write_record(&record).map_err(write_err)?;
    }

    writer.flush().map_err(|e| IoError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
