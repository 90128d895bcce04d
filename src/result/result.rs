use crate::core::{ColumnMeta, Row, Value};
use std::fmt;

/// Tabular query output: ordered column metadata plus rows of cells.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Builds a result whose labels are the given names.
    pub fn from_labels<S: AsRef<str>>(labels: &[S], rows: Vec<Row>) -> Self {
        let columns = labels
            .iter()
            .map(|label| ColumnMeta::new(label.as_ref()).labeled(label.as_ref()))
            .collect();
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names as seen by the mapper (label, else raw name).
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(ColumnMeta::display_name).collect()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columns.is_empty() {
            return writeln!(f, "Empty result set");
        }

        let names = self.column_names();
        let mut widths: Vec<usize> = names.iter().map(|c| c.len()).collect();

        for row in &self.rows {
            for (i, value) in row.iter().enumerate().take(widths.len()) {
                widths[i] = widths[i].max(value.to_string().len());
            }
        }

        let header: Vec<String> = names
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{:width$}", col, width = widths[i]))
            .collect();
        writeln!(f, "{}", header.join(" | "))?;

        let separator: String = widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-");
        writeln!(f, "{}", separator)?;

        for row in &self.rows {
            let row_str: Vec<String> = row
                .iter()
                .enumerate()
                .take(widths.len())
                .map(|(i, val)| format!("{:width$}", val.to_string(), width = widths[i]))
                .collect();
            writeln!(f, "{}", row_str.join(" | "))?;
        }

        write!(f, "\n{} row(s)", self.rows.len())
    }
}
