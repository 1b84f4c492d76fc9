//! Write-off (baixa) derivation.
//!
//! Open MAX titles that no longer appear in the treated source are the
//! candidates for settlement. Each candidate is matched against the costs
//! table; matched rows are projected into the settlement layout and saved,
//! unmatched rows end up in the checagem partition (logged, never persisted).
//!
//! The run is a straight sequence of stages with no retries:
//!
//! 1. load MAX, source and costs;
//! 2. keep open MAX titles;
//! 3. difference open MAX − source;
//! 4. validate the difference;
//! 5. enrich with costs;
//! 6. project into the final layout;
//! 7. save, replacing the outputs of previous runs.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use log::{info, warn};
use rust_decimal::Decimal;

use crate::{
    config::{save_options, BaixaConfig, LayoutSource},
    core::{
        step::{Step, StepExecution, StepStatus},
        table::Table,
    },
    item::csv::csv_reader::load,
    normalize::{format_decimal, normalize_decimal, reformat_currency},
    processor::batimento::filter_open,
    recon::anti_join::{difference, key_set, KeyNormalization},
    tasklet::zip::{newest_zip, remove_previous, save, timestamp},
    BatchError,
};

/// Column added to checagem rows.
pub const CHECAGEM_REASON_COLUMN: &str = "MOTIVO_NAO_EXPORTADO";
/// Reason given to rows without a costs match.
pub const NO_COSTS_MATCH: &str = "Sem match na base custas";

const SAMPLE_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaixaStatus {
    /// The settlement file was written.
    Sucesso,
    /// Nothing qualified, either at the difference or at the enrichment.
    SemRegistros,
}

/// Outcome of [`executar_baixa`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaixaResult {
    pub status: BaixaStatus,
    /// Human-readable summary, also set as the step message.
    pub message: String,
    /// Settlement archive; `None` unless the status is `Sucesso`.
    pub output_file: Option<PathBuf>,
    /// Rows written to the settlement file.
    pub exported: usize,
    /// Candidates without a costs match, kept for review only.
    pub checagem: usize,
    pub duration: Duration,
}

/// Resolves the costs input: a file, or the newest `*.zip` of a directory.
fn resolve_costs(path: &Path) -> Result<PathBuf, BatchError> {
    if path.is_dir() {
        return newest_zip(path)?.ok_or_else(|| BatchError::MissingInput(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(BatchError::MissingInput(path.to_path_buf()));
    }
    Ok(path.to_path_buf())
}

fn sample(keys: &[String]) -> String {
    let mut text = keys
        .iter()
        .take(SAMPLE_SIZE)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if keys.len() > SAMPLE_SIZE {
        text.push_str(&format!(" (+{})", keys.len() - SAMPLE_SIZE));
    }
    text
}

/// Checks the difference before it is enriched.
///
/// Every key of `diff` must be present in `open_max` and absent from `source`.
/// Violations fail with [`BatchError::InvariantViolation`] carrying the first
/// offending keys.
pub fn validate_difference(
    diff: &Table,
    diff_key: &str,
    open_max: &Table,
    max_key: &str,
    source: &Table,
    source_key: &str,
) -> Result<(), BatchError> {
    let diff_idx = diff.require_column(diff_key)?;
    let max_keys = key_set(open_max, max_key, KeyNormalization::Trimmed)?;
    let source_keys = key_set(source, source_key, KeyNormalization::Trimmed)?;

    let keys: Vec<String> = diff
        .column_values(diff_idx)
        .map(|k| k.trim().to_string())
        .collect();

    let absent: Vec<String> = keys
        .iter()
        .filter(|k| !max_keys.contains(*k))
        .cloned()
        .collect();
    if !absent.is_empty() {
        return Err(BatchError::InvariantViolation {
            check: "presence in open MAX".to_string(),
            total: absent.len(),
            sample: sample(&absent),
        });
    }

    let overlapping: Vec<String> = keys
        .iter()
        .filter(|k| source_keys.contains(*k))
        .cloned()
        .collect();
    if !overlapping.is_empty() {
        return Err(BatchError::InvariantViolation {
            check: "absence from source".to_string(),
            total: overlapping.len(),
            sample: sample(&overlapping),
        });
    }

    info!(
        "Difference validated: keys={} open_max={} source={}",
        keys.len(),
        open_max.len(),
        source.len()
    );
    Ok(())
}

/// Difference rows split by costs match, with the paid amount of each matched row.
struct Enrichment {
    matched: Table,
    paid: Vec<Decimal>,
    checagem: Table,
}

fn enrich(
    diff: &Table,
    diff_key: &str,
    costs: &Table,
    costs_key: &str,
    costs_value: &str,
) -> Result<Enrichment, BatchError> {
    let diff_idx = diff.require_column(diff_key)?;
    let key_idx = costs.require_column(costs_key)?;
    let value_idx = costs.column_index(costs_value);
    if value_idx.is_none() {
        warn!(
            "Column '{}' not found in '{}'; paid values default to 0",
            costs_value,
            costs.name()
        );
    }

    let mut amounts: HashMap<String, Decimal> = HashMap::with_capacity(costs.len());
    for row in costs.rows() {
        let key = row[key_idx].trim();
        if key.is_empty() {
            continue;
        }
        let amount = value_idx
            .and_then(|i| normalize_decimal(&row[i]))
            .unwrap_or(Decimal::ZERO);
        amounts.entry(key.to_string()).or_insert(amount);
    }

    let mut matched = Table::new(diff.name(), diff.columns().to_vec());
    let mut paid = Vec::new();
    let mut checagem_columns = diff.columns().to_vec();
    checagem_columns.push(CHECAGEM_REASON_COLUMN.to_string());
    let mut checagem = Table::new(format!("{}_checagem", diff.name()), checagem_columns);

    for row in diff.rows() {
        match amounts.get(row[diff_idx].trim()) {
            Some(amount) => {
                matched.push(row.clone())?;
                paid.push(*amount);
            }
            None => {
                let mut row = row.clone();
                row.push(NO_COSTS_MATCH.to_string());
                checagem.push(row)?;
            }
        }
    }

    info!(
        "Costs enrichment: difference={} matched={} checagem={}",
        diff.len(),
        matched.len(),
        checagem.len()
    );
    Ok(Enrichment {
        matched,
        paid,
        checagem,
    })
}

fn project(
    config: &BaixaConfig,
    enrichment: &Enrichment,
    payment_date: Option<&str>,
) -> Result<Table, BatchError> {
    let table = &enrichment.matched;
    let separator = config.decimal_separator;
    let mut columns = Vec::with_capacity(config.layout.len());

    for column in &config.layout {
        let values: Vec<String> = match &column.source {
            LayoutSource::Column(name) => {
                let idx = table.require_column(name)?;
                table.column_values(idx).map(str::to_string).collect()
            }
            LayoutSource::Decimal(name) => {
                let idx = table.require_column(name)?;
                table
                    .column_values(idx)
                    .map(|v| reformat_currency(v, separator))
                    .collect()
            }
            LayoutSource::Constant(value) => vec![value.clone(); table.len()],
            LayoutSource::PaymentDate => {
                let date = payment_date
                    .ok_or_else(|| BatchError::MissingInput(config.source.path.clone()))?;
                vec![date.to_string(); table.len()]
            }
            LayoutSource::PaidValue => enrichment
                .paid
                .iter()
                .map(|d| format_decimal(*d, separator))
                .collect(),
        };
        columns.push(values);
    }

    let mut output = Table::new(
        config.prefix.as_str(),
        config.layout.iter().map(|c| c.output.clone()).collect(),
    );
    for i in 0..table.len() {
        output.push(columns.iter().map(|values| values[i].clone()).collect())?;
    }
    Ok(output)
}

fn extraction_date(table: &Table, column: &str) -> Option<String> {
    table
        .first_value(column)
        .map(|v| v.chars().take(10).collect())
}

/// Runs the write-off derivation end to end.
///
/// # Errors
///
/// - [`BatchError::MissingInput`] when an input file is absent, or when the
///   layout needs a payment date and none is available;
/// - [`BatchError::MissingColumn`] for absent key or extraction-date columns;
/// - [`BatchError::InvariantViolation`] when the difference is inconsistent.
pub fn executar_baixa(config: &BaixaConfig) -> Result<BaixaResult, BatchError> {
    config.validate()?;
    let start = Instant::now();
    info!("Start of baixa: prefix={}", config.prefix);

    let max = load(&config.max.name, &config.max.path)?;
    let source = load(&config.source.name, &config.source.path)?;
    let costs = load("custas", resolve_costs(&config.costs.path)?)?;

    source.require_column(&config.extraction_date_column)?;
    let payment_date = extraction_date(&source, &config.extraction_date_column).or_else(|| {
        let fallback = extraction_date(&costs, &config.extraction_date_column);
        if fallback.is_some() {
            warn!(
                "No '{}' in '{}'; payment date taken from '{}'",
                config.extraction_date_column,
                source.name(),
                costs.name()
            );
        }
        fallback
    });

    let open_max = filter_open(&max, &config.status);
    if open_max.is_empty() {
        warn!("No open title in '{}'", max.name());
    }

    let diff = difference(&open_max, &config.max.key, &source, &config.source.key)?;
    validate_difference(
        &diff,
        &config.max.key,
        &open_max,
        &config.max.key,
        &source,
        &config.source.key,
    )?;

    if diff.is_empty() {
        let message = format!(
            "Every open title of '{}' is still present in '{}'",
            max.name(),
            source.name()
        );
        warn!("{message}");
        return Ok(BaixaResult {
            status: BaixaStatus::SemRegistros,
            message,
            output_file: None,
            exported: 0,
            checagem: 0,
            duration: start.elapsed(),
        });
    }

    let enrichment = enrich(
        &diff,
        &config.max.key,
        &costs,
        &config.costs.key,
        &config.costs.value,
    )?;
    let exported = enrichment.matched.len();
    let checagem = enrichment.checagem.len();

    if exported == 0 {
        let message = format!(
            "No candidate left after costs enrichment; {checagem} row(s) pending review"
        );
        warn!("{message}");
        return Ok(BaixaResult {
            status: BaixaStatus::SemRegistros,
            message,
            output_file: None,
            exported: 0,
            checagem,
            duration: start.elapsed(),
        });
    }

    let final_table = project(config, &enrichment, payment_date.as_deref())?;

    let output_file = save(
        &final_table,
        &config.output_dir,
        &config.prefix,
        Some(&timestamp()),
        save_options(';')?,
    )?;
    let removed = remove_previous(&config.output_dir, &config.prefix, Some(output_file.as_path()))?;
    if removed > 0 {
        info!("Removed {removed} previous output(s) of '{}'", config.prefix);
    }

    if checagem > 0 {
        info!("Rows kept in memory for review: checagem={checagem}");
    }

    let duration = start.elapsed();
    info!(
        "End of baixa: max={} source={} difference={} exported={} checagem={} duration={:?}",
        max.len(),
        source.len(),
        diff.len(),
        exported,
        checagem,
        duration
    );

    Ok(BaixaResult {
        status: BaixaStatus::Sucesso,
        message: "Baixa completed".to_string(),
        output_file: Some(output_file),
        exported,
        checagem,
        duration,
    })
}

/// [`Step`] running [`executar_baixa`]. `SemRegistros` ends `Empty`.
pub struct BaixaStep {
    name: String,
    config: BaixaConfig,
}

impl BaixaStep {
    pub fn new(name: &str, config: BaixaConfig) -> Self {
        Self {
            name: name.to_owned(),
            config,
        }
    }
}

impl Step for BaixaStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, execution: &mut StepExecution) -> Result<(), BatchError> {
        let result = executar_baixa(&self.config)?;
        execution.write_count = result.exported;
        execution.skip_count = result.checagem;
        execution.output_file = result.output_file;
        execution.message = Some(result.message);
        if result.status == BaixaStatus::SemRegistros {
            execution.status = StepStatus::Empty;
        }
        Ok(())
    }
}
