use std::collections::HashMap;

use log::debug;

use crate::config::ReviewErrors;

/// A rectangular table of text cells with named columns.
///
/// This is the shape of submission files once read back, and of their
/// concatenation.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Table {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn push_row(&mut self, row: Vec<String>) -> Result<(), ReviewErrors> {
        if row.len() != self.columns.len() {
            return Err(ReviewErrors::RowLength {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// All the values of one column, in row order.
    pub fn column(&self, name: &str) -> Result<Vec<&str>, ReviewErrors> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| ReviewErrors::MissingColumn(name.to_string()))?;
        Ok(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Stacks the tables on top of each other.
    ///
    /// The result has every column seen in any of the inputs, in the order
    /// in which they first appear. Cells of a column that a table does not
    /// have are left empty.
    pub fn concat(tables: &[Table]) -> Table {
        let mut columns: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for t in tables {
            for c in t.columns.iter() {
                if !positions.contains_key(c) {
                    positions.insert(c.clone(), columns.len());
                    columns.push(c.clone());
                }
            }
        }
        debug!("concat: {} tables, columns {:?}", tables.len(), columns);

        let mut rows: Vec<Vec<String>> = Vec::new();
        for t in tables {
            let mapping: Vec<usize> = t.columns.iter().map(|c| positions[c]).collect();
            for r in t.rows.iter() {
                let mut row = vec![String::new(); columns.len()];
                for (cell, pos) in r.iter().zip(mapping.iter()) {
                    row[*pos] = cell.clone();
                }
                rows.push(row);
            }
        }
        Table { columns, rows }
    }
}
