//! CSV reading for broker exports.
//!
//! Turns raw bytes into a header list plus data rows, auto-detecting the
//! delimiter and numbering each record the way a spreadsheet shows it
//! (header = row 1, blank lines counted, multi-line quoted cells one row) so
//! row-level errors point at the row a user sees.

use csv::{ReaderBuilder, Terminator};
use serde::{Deserialize, Serialize};

use crate::errors::ImportError;
use crate::Result;

/// Configuration for CSV parsing. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParseConfig {
    /// Whether the CSV has a header row (default: true)
    pub has_header_row: Option<bool>,
    /// Index of the header row after top rows are skipped (default: 0)
    pub header_row_index: Option<usize>,
    /// Delimiter character: ",", ";", "\t", or "auto" (default: "auto")
    pub delimiter: Option<String>,
    /// Quote character (default: "\"")
    pub quote_char: Option<String>,
    /// Number of rows to skip at the top (default: 0)
    pub skip_top_rows: Option<usize>,
    /// Number of rows to skip at the bottom (default: 0)
    pub skip_bottom_rows: Option<usize>,
}

impl ParseConfig {
    pub fn effective_delimiter(&self) -> &str {
        self.delimiter.as_deref().unwrap_or("auto")
    }

    pub fn has_header(&self) -> bool {
        self.has_header_row.unwrap_or(true)
    }

    pub fn header_index(&self) -> usize {
        self.header_row_index.unwrap_or(0)
    }

    pub fn top_skip(&self) -> usize {
        self.skip_top_rows.unwrap_or(0)
    }

    pub fn bottom_skip(&self) -> usize {
        self.skip_bottom_rows.unwrap_or(0)
    }

    pub fn quote_byte(&self) -> u8 {
        self.quote_char
            .as_ref()
            .and_then(|s| s.chars().next())
            .filter(|c| c.is_ascii())
            .map(|c| c as u8)
            .unwrap_or(b'"')
    }
}

/// One data record with its spreadsheet row number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvRow {
    pub row_number: usize,
    pub values: Vec<String>,
}

impl CsvRow {
    pub fn new(row_number: usize, values: Vec<String>) -> Self {
        Self { row_number, values }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedCsvResult {
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
    /// The configuration values actually used (with auto-detected values filled in)
    pub detected_config: ParseConfig,
    /// Non-fatal problems: encoding repairs and ragged rows
    pub warnings: Vec<String>,
}

/// Parses CSV content with the given configuration.
///
/// Fails with [`ImportError::EmptyFile`] when there is no header or no data
/// row, and with [`ImportError::Parse`] when the reader rejects a record.
pub fn parse_csv(content: &[u8], config: &ParseConfig) -> Result<ParsedCsvResult> {
    let mut warnings = Vec::new();

    let content_str = decode_content(content, &mut warnings);
    if content_str.trim().is_empty() {
        return Err(ImportError::EmptyFile.into());
    }

    let delimiter = detect_delimiter(&content_str, config);

    let mut detected_config = config.clone();
    detected_config.delimiter = Some(delimiter.to_string());
    detected_config.has_header_row = Some(config.has_header());
    detected_config.header_row_index = Some(config.header_index());
    detected_config.skip_top_rows = Some(config.top_skip());
    detected_config.skip_bottom_rows = Some(config.bottom_skip());
    detected_config.quote_char = Some((config.quote_byte() as char).to_string());

    let delimiter_byte = delimiter.bytes().next().unwrap_or(b',');
    let (headers, rows) = parse_csv_content(&content_str, delimiter_byte, config, &mut warnings)?;

    for warning in &warnings {
        log::warn!("CSV import: {}", warning);
    }

    Ok(ParsedCsvResult {
        headers,
        rows,
        detected_config,
        warnings,
    })
}

/// Decodes content bytes to a UTF-8 string, dropping a leading BOM.
fn decode_content(content: &[u8], warnings: &mut Vec<String>) -> String {
    let content_without_bom = content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content);

    match std::str::from_utf8(content_without_bom) {
        Ok(s) => s.to_string(),
        Err(e) => {
            warnings.push(format!(
                "Invalid UTF-8 encoding at byte {}. Some characters may be replaced.",
                e.valid_up_to()
            ));
            String::from_utf8_lossy(content_without_bom).into_owned()
        }
    }
}

fn detect_delimiter<'a>(content: &str, config: &'a ParseConfig) -> &'a str {
    match config.effective_delimiter() {
        "auto" => {}
        "\\t" | "\t" => return "\t",
        "" => return ",",
        other => return other,
    }

    let mut best_delimiter = ",";
    let mut best_score = 0usize;
    for delim in [",", ";", "\t"] {
        let score = score_delimiter(content, delim);
        if score > best_score {
            best_score = score;
            best_delimiter = delim;
        }
    }
    best_delimiter
}

/// Scores a delimiter by how often and how consistently it appears in the first lines.
fn score_delimiter(content: &str, delimiter: &str) -> usize {
    let delimiter_char = delimiter.chars().next().unwrap_or(',');
    let counts: Vec<usize> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(10)
        .map(|line| line.matches(delimiter_char).count())
        .collect();

    let Some(&first_count) = counts.first() else {
        return 0;
    };
    let consistent_count = counts.iter().filter(|&&c| c == first_count).count();
    first_count * consistent_count
}

fn parse_csv_content(
    content: &str,
    delimiter: u8,
    config: &ParseConfig,
    warnings: &mut Vec<String>,
) -> Result<(Vec<String>, Vec<CsvRow>)> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .quote(config.quote_byte())
        .has_headers(false)
        .flexible(true)
        .terminator(Terminator::CRLF)
        .from_reader(content.as_bytes());

    let mut all_records: Vec<CsvRow> = Vec::new();
    let mut previous_row = 0usize;
    for result in reader.records() {
        let record = result.map_err(|e| ImportError::Parse(e.to_string()))?;
        // The reader reports where the previous record's terminator ended, so any
        // blank lines it skipped sit between that offset and this record.
        let offset = record.position().map_or(0, |p| p.byte() as usize);
        let row_number = previous_row + 1 + blank_lines_at(content.as_bytes(), offset);
        previous_row = row_number;
        all_records.push(CsvRow::new(
            row_number,
            record.iter().map(|s| s.to_string()).collect(),
        ));
    }

    let start_index = config.top_skip();
    let end_index = all_records.len().saturating_sub(config.bottom_skip());
    if start_index >= end_index {
        return Err(ImportError::EmptyFile.into());
    }
    let mut working: Vec<CsvRow> = all_records.drain(start_index..end_index).collect();

    let headers: Vec<String> = if config.has_header() {
        let header_index = config.header_index().min(working.len() - 1);
        // Anything above the header row is preamble.
        let header_row = working.remove(header_index);
        working.drain(..header_index);
        header_row.values.iter().map(|h| h.trim().to_string()).collect()
    } else {
        let max_cols = working.iter().map(|r| r.values.len()).max().unwrap_or(0);
        (0..max_cols).map(|i| format!("Column{}", i + 1)).collect()
    };

    if working.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(ImportError::EmptyFile.into());
    }

    let header_count = headers.len();
    for row in working.iter_mut() {
        if row.values.len() < header_count {
            row.values.resize(header_count, String::new());
        } else if row.values.len() > header_count {
            warnings.push(format!(
                "Row {} has {} columns, expected {}. Extra columns ignored.",
                row.row_number,
                row.values.len(),
                header_count
            ));
            row.values.truncate(header_count);
        }
    }

    Ok((headers, working))
}

/// Counts the empty lines starting at `offset`. A `\n` that completes a
/// `\r\n` terminator consumed before `offset` is not a line of its own.
fn blank_lines_at(content: &[u8], offset: usize) -> usize {
    let mut idx = offset.min(content.len());
    if idx > 0 && content[idx - 1] == b'\r' && content.get(idx) == Some(&b'\n') {
        idx += 1;
    }

    let mut blanks = 0;
    while idx < content.len() {
        match content[idx] {
            b'\r' => {
                idx += 1;
                if content.get(idx) == Some(&b'\n') {
                    idx += 1;
                }
            }
            b'\n' => idx += 1,
            _ => break,
        }
        blanks += 1;
    }
    blanks
}
