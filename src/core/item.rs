use crate::{core::table::Table, error::BatchError};

/// Anything that can hand a whole table to a stage.
///
/// File-backed sources live in [`crate::item::csv`]; database or HTTP sources
/// can be plugged in by implementing this trait.
pub trait TableSource {
    fn name(&self) -> &str;

    /// Reads the whole table.
    fn read(&self) -> Result<Table, BatchError>;
}

impl TableSource for Table {
    fn name(&self) -> &str {
        Table::name(self)
    }

    fn read(&self) -> Result<Table, BatchError> {
        Ok(self.clone())
    }
}
