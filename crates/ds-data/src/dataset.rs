//! Row-oriented datasets loaded from CSV.
//!
//! Cells are kept as strings (column-major) so that validation and encoding
//! can operate on the raw survey answers; numeric access parses on demand
//! and fails loudly on unparseable or non-finite values.

use std::path::Path;

use ds_core::{Error, Result};

/// A named-column table read from a CSV file with a header row.
///
/// Train and test instances are fully independent in memory; nothing here is
/// shared or mutated after loading.
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<String>,
    /// Column-major cells: `cells[j][i]` is row `i` of column `j`.
    cells: Vec<Vec<String>>,
}

impl Dataset {
    /// Build a dataset from a header and column-major cells.
    pub fn new(columns: Vec<String>, cells: Vec<Vec<String>>) -> Result<Self> {
        if columns.len() != cells.len() {
            return Err(Error::Data(format!(
                "header/cell mismatch: {} column names but {} cell columns",
                columns.len(),
                cells.len()
            )));
        }
        let n_rows = cells.first().map(|c| c.len()).unwrap_or(0);
        for (j, col) in cells.iter().enumerate() {
            if col.len() != n_rows {
                return Err(Error::Data(format!(
                    "ragged columns: column '{}' has {} rows, expected {}",
                    columns[j],
                    col.len(),
                    n_rows
                )));
            }
        }
        Ok(Self { columns, cells })
    }

    /// Read a CSV file (header row required) into a column-major table.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| Error::Data(format!("failed to open {}: {e}", path.display())))?;

        let columns: Vec<String> = rdr
            .headers()
            .map_err(|e| Error::Data(format!("failed to read CSV header of {}: {e}", path.display())))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        if columns.is_empty() {
            return Err(Error::Data(format!("{} has no columns", path.display())));
        }

        let n_cols = columns.len();
        let mut cells: Vec<Vec<String>> = vec![Vec::new(); n_cols];

        for (i, record) in rdr.records().enumerate() {
            let record = record
                .map_err(|e| Error::Data(format!("failed to read row {} of {}: {e}", i + 1, path.display())))?;
            if record.len() != n_cols {
                return Err(Error::Data(format!(
                    "row {} of {} has {} fields, expected {}",
                    i + 1,
                    path.display(),
                    record.len(),
                    n_cols
                )));
            }
            for (j, field) in record.iter().enumerate() {
                cells[j].push(field.trim().to_string());
            }
        }

        if cells[0].is_empty() {
            return Err(Error::Data(format!("{} contains no data rows", path.display())));
        }

        Self::new(columns, cells)
    }

    /// Write the table back out as CSV, creating parent directories.
    pub fn write_csv_path(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let mut wtr = csv::Writer::from_path(path)
            .map_err(|e| Error::Data(format!("failed to create {}: {e}", path.display())))?;
        wtr.write_record(&self.columns)
            .map_err(|e| Error::Data(format!("failed to write header to {}: {e}", path.display())))?;
        for i in 0..self.n_rows() {
            let row: Vec<&str> = self.cells.iter().map(|col| col[i].as_str()).collect();
            wtr.write_record(&row)
                .map_err(|e| Error::Data(format!("failed to write row to {}: {e}", path.display())))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Column names, in file order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn n_rows(&self) -> usize {
        self.cells.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Raw string cells of a column.
    pub fn column(&self, name: &str) -> Result<&[String]> {
        let j = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::Data(format!("no such column: '{name}'")))?;
        Ok(&self.cells[j])
    }

    /// A column parsed as `f64`. Unparseable or non-finite cells are a data
    /// error, never a silent NaN.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        let raw = self.column(name)?;
        let mut out = Vec::with_capacity(raw.len());
        for (i, cell) in raw.iter().enumerate() {
            let v: f64 = cell.parse().map_err(|_| {
                Error::Data(format!("column '{name}', row {}: cannot parse '{cell}' as a number", i + 1))
            })?;
            if !v.is_finite() {
                return Err(Error::Data(format!(
                    "column '{name}', row {}: non-finite value '{cell}'",
                    i + 1
                )));
            }
            out.push(v);
        }
        Ok(out)
    }

    /// A new dataset holding the given rows (by index), in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Result<Self> {
        let n = self.n_rows();
        if let Some(&bad) = indices.iter().find(|&&i| i >= n) {
            return Err(Error::Data(format!("row index {bad} out of bounds ({n} rows)")));
        }
        let cells = self
            .cells
            .iter()
            .map(|col| indices.iter().map(|&i| col[i].clone()).collect())
            .collect();
        Self::new(self.columns.clone(), cells)
    }
}
