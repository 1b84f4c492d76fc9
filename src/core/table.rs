//! In-memory tabular data shared by every stage.
//!
//! A [`Table`] is a list of column names plus rows of text cells. Every source is
//! read as text; typed views (decimals, booleans, dates) are obtained through the
//! [`crate::normalize`] functions when a stage needs them.
//!
//! Tables follow a copy-on-transform discipline: filtering, projecting or
//! extending a table returns a new value and leaves the input untouched.

use crate::BatchError;

/// One record, aligned with the owning table's column list.
pub type Row = Vec<String>;

/// An ordered sequence of rows sharing a schema.
///
/// # Examples
///
/// ```
/// use batimento::core::table::Table;
///
/// let table = Table::from_rows(
///     "max",
///     vec!["CHAVE".to_string(), "STATUS".to_string()],
///     vec![
///         vec!["A".to_string(), "aberto".to_string()],
///         vec!["B".to_string(), "pago".to_string()],
///     ],
/// )
/// .unwrap();
///
/// let open = table.filter(|row| row[1] == "aberto");
/// assert_eq!(open.len(), 1);
/// assert_eq!(table.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Creates an empty table with the given schema.
    pub fn new<S: Into<String>>(name: S, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Creates a table and checks that every row matches the schema arity.
    pub fn from_rows<S: Into<String>>(
        name: S,
        columns: Vec<String>,
        rows: Vec<Row>,
    ) -> Result<Self, BatchError> {
        let mut table = Self::new(name, columns);
        for row in rows {
            table.push(row)?;
        }
        Ok(table)
    }

    /// Name used in diagnostics (`max`, `tabelionato`, `custas`, ...).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the table; used in log messages and errors.
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Column names, in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows, each aligned with [`Table::columns`].
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Exact, case-sensitive lookup.
    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    /// Position of `column`, if present.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Index of `column`, or a [`BatchError::MissingColumn`] naming this table.
    pub fn require_column(&self, column: &str) -> Result<usize, BatchError> {
        self.column_index(column)
            .ok_or_else(|| BatchError::missing_column(&self.name, column))
    }

    /// Appends a row; fails when its arity differs from the schema.
    pub fn push(&mut self, row: Row) -> Result<(), BatchError> {
        if row.len() != self.columns.len() {
            return Err(BatchError::ItemReader(format!(
                "table '{}': row has {} field(s), expected {}",
                self.name,
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Value of `column` in `row`, if the column exists.
    pub fn value<'a>(&self, row: &'a Row, column: &str) -> Option<&'a str> {
        self.column_index(column).map(|idx| row[idx].as_str())
    }

    /// Iterates over the values of one column.
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &str> {
        self.rows.iter().map(move |row| row[idx].as_str())
    }

    /// Returns the rows matching `predicate` as a new table with the same schema.
    pub fn filter<F>(&self, mut predicate: F) -> Table
    where
        F: FnMut(&Row) -> bool,
    {
        Table {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|row| predicate(row)).cloned().collect(),
        }
    }

    /// Splits the rows in two tables according to `mask`.
    ///
    /// Rows flagged `true` go to the first table. `mask` must have one entry per row.
    pub fn partition(&self, mask: &[bool]) -> Result<(Table, Table), BatchError> {
        if mask.len() != self.rows.len() {
            return Err(BatchError::Configuration(format!(
                "table '{}': mask has {} entries for {} rows",
                self.name,
                mask.len(),
                self.rows.len()
            )));
        }

        let mut selected = Table::new(self.name.clone(), self.columns.clone());
        let mut rejected = Table::new(self.name.clone(), self.columns.clone());
        for (row, keep) in self.rows.iter().zip(mask) {
            if *keep {
                selected.rows.push(row.clone());
            } else {
                rejected.rows.push(row.clone());
            }
        }
        Ok((selected, rejected))
    }

    /// Returns a copy where `column` holds `values`, appending the column if absent.
    pub fn with_column(&self, column: &str, values: Vec<String>) -> Result<Table, BatchError> {
        if values.len() != self.rows.len() {
            return Err(BatchError::Configuration(format!(
                "table '{}': column '{}' has {} values for {} rows",
                self.name,
                column,
                values.len(),
                self.rows.len()
            )));
        }

        let mut table = self.clone();
        match table.column_index(column) {
            Some(idx) => {
                for (row, value) in table.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                table.columns.push(column.to_owned());
                for (row, value) in table.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(table)
    }

    /// Returns a copy with `f` applied to every cell of `column`.
    pub fn map_column<F>(&self, column: &str, f: F) -> Result<Table, BatchError>
    where
        F: Fn(&str) -> String,
    {
        let idx = self.require_column(column)?;
        let mut table = self.clone();
        for row in table.rows.iter_mut() {
            row[idx] = f(&row[idx]);
        }
        Ok(table)
    }

    /// Projects the table onto `columns`, in that order.
    pub fn select(&self, columns: &[&str]) -> Result<Table, BatchError> {
        let indexes = columns
            .iter()
            .map(|c| self.require_column(c))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Table {
            name: self.name.clone(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indexes.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    /// First non-blank value of `column`, trimmed.
    pub fn first_value(&self, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.column_values(idx)
            .map(str::trim)
            .find(|v| !v.is_empty() && !v.eq_ignore_ascii_case("nan"))
    }
}
