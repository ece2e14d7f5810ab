use super::csv_parser::CsvRow;

const FOOTER_MARKERS: [&str; 2] = ["as of", "generated"];

/// Whether a row carries data worth handing to an adapter.
///
/// Blank rows and export footers ("Data as of ...", "Generated on ...") are
/// dropped silently and never counted as successes or failures.
pub fn is_meaningful_row(row: &CsvRow) -> bool {
    if row.values.iter().all(|v| v.trim().is_empty()) {
        return false;
    }
    let first = row
        .values
        .first()
        .map(|v| v.to_lowercase())
        .unwrap_or_default();
    !FOOTER_MARKERS.iter().any(|marker| first.contains(marker))
}

pub fn filter_rows(rows: Vec<CsvRow>) -> Vec<CsvRow> {
    let total = rows.len();
    let kept: Vec<CsvRow> = rows.into_iter().filter(is_meaningful_row).collect();
    if kept.len() < total {
        log::debug!("Row filter dropped {} of {} rows", total - kept.len(), total);
    }
    kept
}
