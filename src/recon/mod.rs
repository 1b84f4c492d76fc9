//! Set reconciliation between two tables.

pub mod anti_join;

pub mod judicial;

pub use anti_join::{difference, difference_by, key_set, KeyNormalization};
pub use judicial::{JudicialConfig, JudicialCpfs, JudicialSplitter};
