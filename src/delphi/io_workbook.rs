// Excel output of the consolidated tables.

use std::path::Path;

use delphi_review::table::Table;
use rust_xlsxwriter::Workbook;
use snafu::prelude::*;

use crate::delphi::*;

/// Row limit of an xlsx worksheet.
pub const MAX_ROWS: usize = 1_048_576;

/// A table to write as one worksheet.
pub struct Sheet<'a> {
    pub name: &'a str,
    pub table: &'a Table,
    /// Columns written as numbers when their cells parse as such.
    pub numeric_columns: &'a [&'a str],
}

/// Writes the sheets into a new workbook, in order, replacing any previous file.
pub fn write_workbook(path: &Path, sheets: &[Sheet]) -> DelphiResult<()> {
    let p = path.display().to_string();
    let mut workbook = Workbook::new();
    for sheet in sheets.iter() {
        // The header takes one row.
        ensure!(
            sheet.table.len() < MAX_ROWS,
            SheetTooLargeSnafu {
                sheet: sheet.name,
                rows: sheet.table.len(),
            }
        );
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(sheet.name)
            .context(WorkbookSnafu { path: p.clone() })?;

        for (col, name) in sheet.table.columns().iter().enumerate() {
            worksheet
                .write_string(0, col as u16, name)
                .context(WorkbookSnafu { path: p.clone() })?;
        }
        let numeric: Vec<bool> = sheet
            .table
            .columns()
            .iter()
            .map(|c| sheet.numeric_columns.contains(&c.as_str()))
            .collect();
        for (ridx, row) in sheet.table.rows().iter().enumerate() {
            let r = (ridx + 1) as u32;
            for (cidx, cell) in row.iter().enumerate() {
                let c = cidx as u16;
                let number = if numeric[cidx] {
                    cell.parse::<f64>().ok()
                } else {
                    None
                };
                match number {
                    Some(x) => worksheet.write_number(r, c, x),
                    None => worksheet.write_string(r, c, cell),
                }
                .context(WorkbookSnafu { path: p.clone() })?;
            }
        }
        debug!(
            "write_workbook: sheet {} with {} rows",
            sheet.name,
            sheet.table.len()
        );
    }
    workbook.save(path).context(WorkbookSnafu { path: p })?;
    info!("Workbook written to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook, DataType, Reader, Xlsx};
    use tempfile::TempDir;

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        let mut t = Table::new(columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            t.push_row(row.iter().map(|c| c.to_string()).collect())
                .unwrap();
        }
        t
    }

    #[test]
    fn sheets_read_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.xlsx");
        let answers = table(&["codigo", "voto"], &[&["A1", "Manter"], &["A2", "Ajustar"]]);
        let total = table(&["voto", "n", "percentual"], &[&["Manter", "1", "50.00"]]);
        write_workbook(
            &path,
            &[
                Sheet {
                    name: "respostas",
                    table: &answers,
                    numeric_columns: &[],
                },
                Sheet {
                    name: "resumo_total",
                    table: &total,
                    numeric_columns: &["n", "percentual"],
                },
            ],
        )
        .unwrap();

        let mut wb: Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(
            wb.sheet_names().to_vec(),
            vec!["respostas".to_string(), "resumo_total".to_string()]
        );
        let range = wb.worksheet_range("resumo_total").unwrap().unwrap();
        assert_eq!(range.get_value((1, 0)), Some(&DataType::String("Manter".to_string())));
        assert_eq!(range.get_value((1, 1)), Some(&DataType::Float(1.0)));
        let range = wb.worksheet_range("respostas").unwrap().unwrap();
        assert_eq!(range.get_size(), (3, 2));
    }
}
