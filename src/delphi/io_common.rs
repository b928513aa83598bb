// Primitives shared by the readers and writers.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use csv::Writer;
use delphi_review::table::Table;
use snafu::prelude::*;

use crate::delphi::*;

pub fn simplify_file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Header names are compared lower-cased and without surrounding blanks.
pub fn normalize_header(s: &str) -> String {
    s.trim_start_matches('\u{feff}').trim().to_lowercase()
}

pub fn write_records<W: std::io::Write>(
    wtr: &mut Writer<W>,
    table: &Table,
    path: &Path,
) -> DelphiResult<()> {
    let p = path.display().to_string();
    wtr.write_record(table.columns())
        .context(WriteCsvSnafu { path: p.clone() })?;
    for row in table.rows() {
        wtr.write_record(row)
            .context(WriteCsvSnafu { path: p.clone() })?;
    }
    wtr.flush().context(WriteFileSnafu { path: p })?;
    Ok(())
}

/// Writes a table as a CSV file with a header row, replacing any previous file.
pub fn write_table_csv(table: &Table, path: &Path) -> DelphiResult<()> {
    let mut wtr: Writer<File> = Writer::from_path(path).context(WriteCsvSnafu {
        path: path.display().to_string(),
    })?;
    write_records(&mut wtr, table, path)
}

/// Renders a table as CSV text.
pub fn table_to_csv_string(table: &Table) -> DelphiResult<String> {
    let mut wtr = Writer::from_writer(vec![]);
    write_records(&mut wtr, table, Path::new("<memory>"))?;
    let bytes = match wtr.into_inner() {
        Ok(b) => b,
        Err(e) => whatever!("Could not render CSV: {}", e),
    };
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => whatever!("CSV output is not valid UTF-8: {}", e),
    }
}

/// Reads a CSV file with a header row into a table.
///
/// Every row must have as many cells as the header, and the header names
/// must be distinct.
pub fn read_table_csv(path: &Path) -> DelphiResult<Table> {
    let p = path.display().to_string();
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context(ReadCsvSnafu { path: p.clone() })?;
    let header: Vec<String> = rdr
        .headers()
        .context(ReadCsvSnafu { path: p.clone() })?
        .iter()
        .map(|s| s.trim_start_matches('\u{feff}').to_string())
        .collect();
    ensure!(
        !header.is_empty() && header.iter().any(|h| !h.trim().is_empty()),
        MissingHeaderSnafu { path: p.clone() }
    );
    let mut seen: HashSet<&str> = HashSet::new();
    if let Some(dup) = header.iter().find(|h| !seen.insert(h.as_str())) {
        return DuplicateColumnSnafu {
            path: p,
            column: dup.clone(),
        }
        .fail();
    }

    let mut table = Table::new(header);
    for record in rdr.records() {
        let record = record.context(ReadCsvSnafu { path: p.clone() })?;
        table
            .push_row(record.iter().map(|s| s.to_string()).collect())
            .context(ReviewSnafu { path: p.clone() })?;
    }
    Ok(table)
}
