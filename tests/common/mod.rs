#![allow(dead_code)]

pub mod mocks;

use std::path::{Path, PathBuf};

use batimento::{
    core::table::Table,
    tasklet::zip::{save, SaveOptions},
};

/// Builds a table from a header and string rows.
pub fn table(name: &str, columns: &[&str], rows: &[&[&str]]) -> Table {
    Table::from_rows(
        name,
        columns.iter().map(|c| c.to_string()).collect(),
        rows.iter()
            .map(|row| row.iter().map(|v| v.to_string()).collect())
            .collect(),
    )
    .unwrap()
}

/// Saves `table` as `{dir}/{stem}.zip`, the way extractors leave their output.
pub fn save_zip(table: &Table, dir: &Path, stem: &str) -> PathBuf {
    save(table, dir, stem, None, SaveOptions::default()).unwrap()
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
