// ⬇️ CSV Export - the download of the current search/sort result
//
// Exports the ungrouped projection (one line per record) with a header row.

use crate::record::{Cell, Column, EntityRecord};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::io::Write;
use std::path::Path;

/// Dates in exported files use ISO format
pub const EXPORT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Download filename, stamped with the export time
pub fn export_filename(now: NaiveDateTime) -> String {
    format!("entidades_filtradas_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

fn export_value(cell: &Cell) -> String {
    match cell {
        Cell::Null => String::new(),
        Cell::Text(s) => s.clone(),
        Cell::Date(d) => d.format(EXPORT_DATE_FORMAT).to_string(),
    }
}

/// Write records as UTF-8 CSV; returns the number of data rows written.
/// An empty column list exports the default display columns.
pub fn write_csv<W: Write>(writer: W, records: &[&EntityRecord], columns: &[Column]) -> Result<usize> {
    let columns: &[Column] = if columns.is_empty() {
        &Column::DEFAULT_DISPLAY
    } else {
        columns
    };

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(columns.iter().map(|c| c.name()))
        .context("Failed to write CSV header")?;

    for record in records {
        let values: Vec<String> = record.project(columns).iter().map(export_value).collect();
        wtr.write_record(&values)
            .with_context(|| format!("Failed to write CSV row for {}", record.entity_name))?;
    }

    wtr.flush().context("Failed to flush CSV output")?;
    Ok(records.len())
}

/// Render the export in memory (HTTP download body)
pub fn export_csv_string(records: &[&EntityRecord], columns: &[Column]) -> Result<String> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, records, columns)?;
    String::from_utf8(buffer).context("CSV output is not valid UTF-8")
}

/// Write the export to a file
pub fn export_to_path(path: &Path, records: &[&EntityRecord], columns: &[Column]) -> Result<usize> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create export file: {}", path.display()))?;
    let rows = write_csv(file, records, columns)?;

    tracing::info!(path = %path.display(), rows, "CSV export written");
    Ok(rows)
}
