use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
/// Batch error
pub enum BatchError {
    /// A stage configuration is incomplete or inconsistent.
    #[error("Configuration: {0}")]
    Configuration(String),

    /// A required column is absent from a table schema.
    #[error("Missing column '{column}' in table '{table}'")]
    MissingColumn { table: String, column: String },

    /// A required input file or directory does not exist.
    #[error("Missing input: {}", .0.display())]
    MissingInput(PathBuf),

    /// A reconciliation invariant does not hold. `sample` is already bounded.
    #[error("Invariant violation in '{check}': {total} inconsistent key(s): {sample}")]
    InvariantViolation {
        check: String,
        total: usize,
        sample: String,
    },

    #[error("ItemReader from: {0}")]
    ItemReader(String),

    #[error("ItemWriter from: {0}")]
    ItemWriter(String),

    /// A job step failed; `source` is the error it returned.
    #[error("Step '{name}' failed: {source}")]
    Step {
        name: String,
        #[source]
        source: Box<BatchError>,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BatchError {
    pub(crate) fn missing_column(table: &str, column: &str) -> Self {
        BatchError::MissingColumn {
            table: table.to_owned(),
            column: column.to_owned(),
        }
    }

    /// The error behind a chain of step failures.
    pub fn root_cause(&self) -> &BatchError {
        match self {
            BatchError::Step { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns `true` for errors caused by configuration rather than data.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BatchError::Configuration(_)
                | BatchError::MissingColumn { .. }
                | BatchError::MissingInput(_)
        )
    }
}
