//! Typed configuration of every stage.
//!
//! Each stage receives one struct, validated eagerly with `validate()` before
//! any file is touched. All structs deserialize with `serde`, so a deployment
//! can keep them in JSON files loaded with [`load_json`].

use std::{fs, path::Path, path::PathBuf};

use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    core::table::Table, recon::anti_join::KeyNormalization, recon::judicial::JudicialConfig,
    tasklet::zip::SaveOptions, BatchError,
};

/// Reads a JSON document into any configuration struct.
pub fn load_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, BatchError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(BatchError::MissingInput(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn require(value: &str, what: &str, stage: &str) -> Result<(), BatchError> {
    if value.trim().is_empty() {
        return Err(BatchError::Configuration(format!("{stage}: {what} is required")));
    }
    Ok(())
}

fn require_path(path: &Path, what: &str, stage: &str) -> Result<(), BatchError> {
    if path.as_os_str().is_empty() {
        return Err(BatchError::Configuration(format!("{stage}: {what} is required")));
    }
    Ok(())
}

fn default_separator() -> char {
    ','
}

fn default_delimiter() -> char {
    ';'
}

/// A table read from disk and the column holding its business key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInput {
    /// Table name used in logs and errors.
    pub name: String,
    pub path: PathBuf,
    /// Business key column.
    pub key: String,
}

impl TableInput {
    pub fn new<P: Into<PathBuf>>(name: &str, path: P, key: &str) -> Self {
        Self {
            name: name.to_owned(),
            path: path.into(),
            key: key.to_owned(),
        }
    }

    fn validate(&self, stage: &str) -> Result<(), BatchError> {
        require(&self.name, "input name", stage)?;
        require_path(&self.path, &format!("path of '{}'", self.name), stage)?;
        require(&self.key, &format!("key column of '{}'", self.name), stage)
    }
}

/// Keeps rows whose status belongs to the open vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFilter {
    pub column: String,
    /// Compared after trim + lowercase.
    pub open_values: Vec<String>,
}

impl Default for StatusFilter {
    fn default() -> Self {
        Self {
            column: "STATUS_TITULO".to_string(),
            open_values: ["aberto", "em aberto", "a", "0"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl StatusFilter {
    pub fn is_open(&self, status: &str) -> bool {
        let status = status.trim().to_lowercase();
        self.open_values.iter().any(|v| v.trim().to_lowercase() == status)
    }
}

/// How the business key of a table is built.
///
/// Multi-field keys are joined with `separator`, e.g. `CONTRATO-PARCELA`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    pub columns: Vec<String>,
    #[serde(default = "KeySpec::default_separator")]
    pub separator: String,
    #[serde(default)]
    pub normalization: KeyNormalization,
    /// Column receiving the key; replaced when it already exists.
    pub target: String,
}

impl KeySpec {
    fn default_separator() -> String {
        "-".to_string()
    }

    /// Key taken from one column, written back to `target`.
    pub fn single(column: &str, target: &str) -> Self {
        Self {
            columns: vec![column.to_owned()],
            separator: Self::default_separator(),
            normalization: KeyNormalization::Trimmed,
            target: target.to_owned(),
        }
    }

    pub fn composite(columns: &[&str], separator: &str, target: &str) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            separator: separator.to_owned(),
            normalization: KeyNormalization::Trimmed,
            target: target.to_owned(),
        }
    }

    pub fn normalization(mut self, normalization: KeyNormalization) -> Self {
        self.normalization = normalization;
        self
    }

    /// One key per row; empty when any component is empty after normalization.
    pub fn build(&self, table: &Table) -> Result<Vec<String>, BatchError> {
        let indexes = self
            .columns
            .iter()
            .map(|c| table.require_column(c))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(table
            .rows()
            .iter()
            .map(|row| {
                let parts: Vec<String> = indexes
                    .iter()
                    .map(|&i| self.normalization.apply(&row[i]))
                    .collect();
                if parts.iter().any(String::is_empty) {
                    String::new()
                } else {
                    parts.join(&self.separator)
                }
            })
            .collect())
    }

    fn validate(&self, stage: &str) -> Result<(), BatchError> {
        if self.columns.is_empty() || self.columns.iter().any(|c| c.trim().is_empty()) {
            return Err(BatchError::Configuration(format!(
                "{stage}: key needs at least one non-empty column"
            )));
        }
        require(&self.target, "key target column", stage)
    }
}

/// Keeps only clients whose oldest due date is at least `limit_days` old.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingFilter {
    pub client_column: String,
    /// Due dates, `dd/mm/yyyy` or ISO.
    pub due_column: String,
    pub limit_days: i64,
    /// Defaults to today.
    #[serde(default)]
    pub reference_date: Option<NaiveDate>,
}

/// Configuration of a `tratar_*` stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreatmentConfig {
    pub name: String,
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Archive stem; the table is saved as `{output_dir}/{output_name}.zip`.
    pub output_name: String,
    pub key: KeySpec,
    #[serde(default)]
    pub text_columns: Vec<String>,
    #[serde(default)]
    pub decimal_columns: Vec<String>,
    #[serde(default)]
    pub date_columns: Vec<String>,
    /// Checked before anything else; a missing one fails with `MissingColumn`.
    #[serde(default)]
    pub required_columns: Vec<String>,
    #[serde(default)]
    pub aging: Option<AgingFilter>,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl TreatmentConfig {
    /// Checks names, paths and key columns; fails with `Configuration`.
    pub fn validate(&self) -> Result<(), BatchError> {
        require(&self.name, "stage name", "treatment")?;
        let stage = format!("treatment '{}'", self.name);
        require_path(&self.input, "input path", &stage)?;
        require_path(&self.output_dir, "output directory", &stage)?;
        require(&self.output_name, "output name", &stage)?;
        self.key.validate(&stage)?;
        if let Some(aging) = &self.aging {
            require(&aging.client_column, "aging client column", &stage)?;
            require(&aging.due_column, "aging due-date column", &stage)?;
            if aging.limit_days < 0 {
                return Err(BatchError::Configuration(format!(
                    "{stage}: aging limit must not be negative"
                )));
            }
        }
        Ok(())
    }
}

/// Configuration of the batimento and devolução stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    pub name: String,
    /// Rows kept in the difference come from this side.
    pub left: TableInput,
    pub right: TableInput,
    #[serde(default)]
    pub normalization: KeyNormalization,
    /// Applied to the left table before the difference.
    #[serde(default)]
    pub open_status: Option<StatusFilter>,
    pub judicial: JudicialConfig,
    pub output_dir: PathBuf,
    /// File stem prefix of the written portfolios.
    pub prefix: String,
}

impl ReconciliationConfig {
    pub fn validate(&self) -> Result<(), BatchError> {
        require(&self.name, "stage name", "reconciliation")?;
        let stage = format!("reconciliation '{}'", self.name);
        self.left.validate(&stage)?;
        self.right.validate(&stage)?;
        require_path(&self.output_dir, "output directory", &stage)?;
        require(&self.prefix, "output prefix", &stage)?;
        if let Some(filter) = &self.open_status {
            require(&filter.column, "status column", &stage)?;
        }
        Ok(())
    }
}

/// The costs table used to enrich write-off candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostsInput {
    /// A file, or a directory whose most recent `*.zip` is used.
    pub path: PathBuf,
    pub key: String,
    /// Paid amount column.
    pub value: String,
}

impl CostsInput {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            key: "Protocolo".to_string(),
            value: "Valor Total Pago".to_string(),
        }
    }
}

/// Where a column of the final write-off file comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", content = "value", rename_all = "snake_case")]
pub enum LayoutSource {
    /// Copied as-is from the candidate row.
    Column(String),
    /// Re-parsed as a decimal and rendered with two places.
    Decimal(String),
    Constant(String),
    /// The extraction date of the source table.
    PaymentDate,
    /// The amount found in the costs table.
    PaidValue,
}

/// One column of the write-off file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutColumn {
    pub output: String,
    pub source: LayoutSource,
}

impl LayoutColumn {
    pub fn new(output: &str, source: LayoutSource) -> Self {
        Self {
            output: output.to_owned(),
            source,
        }
    }
}

/// Final layout expected by the settlement system.
pub fn default_baixa_layout() -> Vec<LayoutColumn> {
    use LayoutSource::*;
    vec![
        LayoutColumn::new("NOME CLIENTE", Column("NOME_RAZAO_SOCIAL".into())),
        LayoutColumn::new("CPF/CNPJ CLIENTE", Column("CPFCNPJ_CLIENTE".into())),
        LayoutColumn::new("CNPJ CREDOR", Column("CNPJ_CREDOR".into())),
        LayoutColumn::new("NUMERO DOC", Column("CHAVE".into())),
        LayoutColumn::new("VALOR DA PARCELA", Decimal("VALOR".into())),
        LayoutColumn::new("DT. VENCIMENTO", Column("VENCIMENTO".into())),
        LayoutColumn::new("STATUS ACORDO", Constant("2".into())),
        LayoutColumn::new("DT. PAGAMENTO", PaymentDate),
        LayoutColumn::new("VALOR RECEBIDO", PaidValue),
    ]
}

/// Configuration of the write-off (baixa) stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaixaConfig {
    pub max: TableInput,
    pub source: TableInput,
    pub costs: CostsInput,
    #[serde(default)]
    pub status: StatusFilter,
    /// Column of the source table holding the extraction date.
    pub extraction_date_column: String,
    #[serde(default = "default_baixa_layout")]
    pub layout: Vec<LayoutColumn>,
    pub output_dir: PathBuf,
    pub prefix: String,
    #[serde(default = "default_separator")]
    pub decimal_separator: char,
}

impl BaixaConfig {
    pub fn validate(&self) -> Result<(), BatchError> {
        let stage = "baixa";
        self.max.validate(stage)?;
        self.source.validate(stage)?;
        require_path(&self.costs.path, "costs path", stage)?;
        require(&self.costs.key, "costs key column", stage)?;
        require(&self.costs.value, "costs value column", stage)?;
        require(&self.status.column, "status column", stage)?;
        require(&self.extraction_date_column, "extraction date column", stage)?;
        require_path(&self.output_dir, "output directory", stage)?;
        require(&self.prefix, "output prefix", stage)?;
        if self.layout.is_empty() {
            return Err(BatchError::Configuration(format!("{stage}: empty output layout")));
        }
        Ok(())
    }
}

/// Single-byte delimiter used by the CSV writer.
pub fn delimiter_byte(delimiter: char) -> Result<u8, BatchError> {
    if delimiter.is_ascii() {
        Ok(delimiter as u8)
    } else {
        Err(BatchError::Configuration(format!(
            "delimiter {delimiter:?} is not a single-byte character"
        )))
    }
}

/// Save options for a delimiter given as a character.
pub fn save_options(delimiter: char) -> Result<SaveOptions, BatchError> {
    Ok(SaveOptions {
        delimiter: delimiter_byte(delimiter)?,
        ..SaveOptions::default()
    })
}
