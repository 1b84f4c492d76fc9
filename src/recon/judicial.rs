use std::{collections::HashSet, path::PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    core::table::Table,
    item::csv::csv_reader::load,
    normalize::{digits_only, is_valid_document},
    BatchError,
};

/// Values of `IS_JUDICIAL` that mark a judicial record (after trim + uppercase).
pub const JUDICIAL_FLAGS: [&str; 4] = ["1", "SIM", "TRUE", "JUDICIAL"];

/// Document columns looked up, in order, when matching against the CPF set.
pub const DOCUMENT_COLUMNS: [&str; 5] = [
    "CPFCNPJ_CLIENTE",
    "CPFCNPJ CLIENTE",
    "CPF_CNPJ",
    "CPF/CNPJ",
    "CPF",
];

/// Where the judicial client list lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudicialConfig {
    /// `ClientesJudiciais.zip` or a raw `;` CSV.
    pub reference_file: PathBuf,
}

impl JudicialConfig {
    pub fn new<P: Into<PathBuf>>(reference_file: P) -> Self {
        Self {
            reference_file: reference_file.into(),
        }
    }
}

/// Load state of the judicial CPF/CNPJ set, as seen through
/// [`JudicialSplitter::state`]. The set is loaded at most once per splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JudicialCpfs<'a> {
    Unloaded,
    Loaded(&'a HashSet<String>),
}

/// Splits a table into judicial and extrajudicial portfolios.
///
/// Classification uses, in order: an `IS_JUDICIAL` flag column, a `TIPO_FLUXO`
/// column, then membership of the client document in the judicial CPF set.
/// The set is read from disk only when the third strategy is reached.
#[derive(Debug)]
pub struct JudicialSplitter {
    config: JudicialConfig,
    cpfs: Option<HashSet<String>>,
}

impl JudicialSplitter {
    /// Nothing is read until a table needs the CPF set.
    pub fn new(config: JudicialConfig) -> Self {
        Self { config, cpfs: None }
    }

    /// Uses an already known set instead of reading the reference file.
    pub fn with_cpfs(config: JudicialConfig, cpfs: HashSet<String>) -> Self {
        Self {
            config,
            cpfs: Some(cpfs),
        }
    }

    /// Whether the CPF set has been loaded yet.
    pub fn state(&self) -> JudicialCpfs<'_> {
        match &self.cpfs {
            Some(cpfs) => JudicialCpfs::Loaded(cpfs),
            None => JudicialCpfs::Unloaded,
        }
    }

    /// Loads the reference file on first call and returns the set.
    ///
    /// A missing or unreadable file yields an empty set and a warning: every
    /// record is then classified as extrajudicial.
    pub fn ensure_loaded(&mut self) -> &HashSet<String> {
        let config = &self.config;
        self.cpfs.get_or_insert_with(|| read_reference(config))
    }

    /// One flag per row: `true` for judicial.
    pub fn mask_judicial(&mut self, table: &Table) -> Vec<bool> {
        if let Some(idx) = table.column_index("IS_JUDICIAL") {
            return table
                .column_values(idx)
                .map(|v| JUDICIAL_FLAGS.contains(&v.trim().to_uppercase().as_str()))
                .collect();
        }

        if let Some(idx) = table.column_index("TIPO_FLUXO") {
            return table
                .column_values(idx)
                .map(|v| v.trim().to_uppercase() == "JUDICIAL")
                .collect();
        }

        let Some(idx) = DOCUMENT_COLUMNS.iter().find_map(|c| table.column_index(c)) else {
            debug!(
                "No document column in '{}'; every record is extrajudicial",
                table.name()
            );
            return vec![false; table.len()];
        };

        let cpfs = self.ensure_loaded();
        table
            .column_values(idx)
            .map(|v| cpfs.contains(&digits_only(v)))
            .collect()
    }

    /// Returns `(judicial, extrajudicial)`; together they hold every input row once.
    pub fn dividir_carteiras(&mut self, table: &Table) -> Result<(Table, Table), BatchError> {
        if table.is_empty() {
            return Ok((table.clone(), table.clone()));
        }

        let mask = self.mask_judicial(table);
        let (judicial, extrajudicial) = table.partition(&mask)?;

        info!(
            "Portfolio split of '{}': judicial={} extrajudicial={}",
            table.name(),
            judicial.len(),
            extrajudicial.len()
        );
        Ok((judicial, extrajudicial))
    }
}

/// Reads the judicial client list.
///
/// A missing or unreadable file, or one without a CPF/CNPJ column, yields an
/// empty set and a warning: every record is then classified as extrajudicial.
fn read_reference(config: &JudicialConfig) -> HashSet<String> {
    let path = &config.reference_file;
    if !path.is_file() {
        warn!(
            "Judicial client file not found: {}; every record is extrajudicial",
            path.display()
        );
        return HashSet::new();
    }

    let table = match load("clientes_judiciais", path) {
        Ok(table) => table,
        Err(error) => {
            warn!("Cannot read judicial client file {}: {}", path.display(), error);
            return HashSet::new();
        }
    };

    let column = table.columns().iter().position(|c| {
        let upper = c.to_uppercase();
        upper.contains("CPF") || upper.contains("CNPJ")
    });
    let Some(idx) = column else {
        warn!("No CPF/CNPJ column in judicial client file {}", path.display());
        return HashSet::new();
    };

    let cpfs: HashSet<String> = table
        .column_values(idx)
        .map(digits_only)
        .filter(|d| is_valid_document(d))
        .collect();

    info!("Judicial CPFs loaded: {} from {}", cpfs.len(), path.display());
    cpfs
}
