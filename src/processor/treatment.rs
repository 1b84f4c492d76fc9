//! `tratar_*`: turns a raw extraction into the canonical table used by the
//! reconciliation stages.

use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    time::{Duration, Instant},
};

use chrono::{Local, NaiveDate};
use log::{debug, info};

use crate::{
    config::{delimiter_byte, save_options, AgingFilter, TreatmentConfig},
    core::{
        item::TableSource,
        step::{Step, StepExecution, StepStatus},
        table::Table,
    },
    item::csv::csv_reader::CsvTableReaderBuilder,
    normalize::{format_decimal, normalize_date, normalize_decimal, normalize_text},
    tasklet::zip::save,
    BatchError,
};

/// Outcome of [`tratar`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreatmentStats {
    pub input_rows: usize,
    pub output_rows: usize,
    /// Rows dropped for an empty business key.
    pub missing_key: usize,
    /// Rows dropped because their key was already seen.
    pub duplicates: usize,
    /// Rows removed by the aging filter, including rows with an unreadable due date.
    pub aged_out: usize,
    pub output_file: PathBuf,
    pub duration: Duration,
}

/// Row counts of [`treat_table`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TreatmentCounts {
    pub missing_key: usize,
    pub duplicates: usize,
    pub aged_out: usize,
}

/// Loads `config.input`, treats it and saves `{output_dir}/{output_name}.zip`.
pub fn tratar(config: &TreatmentConfig) -> Result<TreatmentStats, BatchError> {
    config.validate()?;
    let start = Instant::now();

    let table = CsvTableReaderBuilder::new()
        .delimiter(delimiter_byte(config.delimiter)?)
        .from_path(&config.name, &config.input)
        .read()?;

    let (treated, counts) = treat_table(config, &table)?;
    let output_file = save(
        &treated,
        &config.output_dir,
        &config.output_name,
        None,
        save_options(config.delimiter)?,
    )?;

    let stats = TreatmentStats {
        input_rows: table.len(),
        output_rows: treated.len(),
        missing_key: counts.missing_key,
        duplicates: counts.duplicates,
        aged_out: counts.aged_out,
        output_file,
        duration: start.elapsed(),
    };

    info!(
        "Treatment {}: input={} output={} missing_key={} duplicates={} aged_out={} duration={:?}",
        config.name,
        stats.input_rows,
        stats.output_rows,
        stats.missing_key,
        stats.duplicates,
        stats.aged_out,
        stats.duration
    );
    Ok(stats)
}

/// Normalizes the configured columns, builds the key, then drops rows without
/// a key and repeated keys (first occurrence kept).
pub fn treat_table(
    config: &TreatmentConfig,
    table: &Table,
) -> Result<(Table, TreatmentCounts), BatchError> {
    for column in config
        .required_columns
        .iter()
        .chain(&config.text_columns)
        .chain(&config.decimal_columns)
        .chain(&config.date_columns)
    {
        table.require_column(column)?;
    }

    let mut treated = table.clone();
    for column in &config.text_columns {
        treated = treated.map_column(column, normalize_text)?;
    }
    for column in &config.date_columns {
        treated = treated.map_column(column, normalize_date)?;
    }
    for column in &config.decimal_columns {
        treated = treated.map_column(column, |v| {
            normalize_decimal(v)
                .map(|d| format_decimal(d, '.'))
                .unwrap_or_default()
        })?;
    }

    let keys = config.key.build(&treated)?;
    treated = treated.with_column(&config.key.target, keys)?;
    let key_idx = treated.require_column(&config.key.target)?;

    let mut counts = TreatmentCounts::default();
    let with_key = treated.filter(|row| !row[key_idx].is_empty());
    counts.missing_key = treated.len() - with_key.len();

    let mut seen = HashSet::new();
    let unique = with_key.filter(|row| seen.insert(row[key_idx].clone()));
    counts.duplicates = with_key.len() - unique.len();

    let result = match &config.aging {
        Some(aging) => {
            let kept = filter_by_aging(&unique, aging)?;
            counts.aged_out = unique.len() - kept.len();
            kept
        }
        None => unique,
    };

    debug!(
        "Treated '{}': missing_key={} duplicates={} aged_out={}",
        table.name(),
        counts.missing_key,
        counts.duplicates,
        counts.aged_out
    );
    Ok((result.with_name(config.name.clone()), counts))
}

/// Parses `DD/MM/YYYY` or ISO dates, ignoring any time part.
pub fn parse_due_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let date_part = value.split_whitespace().next()?;
    let date_part = date_part.split('T').next().unwrap_or(date_part);
    NaiveDate::parse_from_str(date_part, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%Y-%m-%d"))
        .ok()
}

/// Keeps every row of the clients whose largest aging reaches the limit.
///
/// Rows with an unreadable due date are dropped.
pub fn filter_by_aging(table: &Table, aging: &AgingFilter) -> Result<Table, BatchError> {
    let client_idx = table.require_column(&aging.client_column)?;
    let due_idx = table.require_column(&aging.due_column)?;
    let reference = aging
        .reference_date
        .unwrap_or_else(|| Local::now().date_naive());

    let mut oldest: HashMap<String, i64> = HashMap::new();
    for row in table.rows() {
        if let Some(due) = parse_due_date(&row[due_idx]) {
            let days = (reference - due).num_days().max(0);
            let client = row[client_idx].trim().to_string();
            let entry = oldest.entry(client).or_insert(0);
            *entry = (*entry).max(days);
        }
    }

    let critical: HashSet<&String> = oldest
        .iter()
        .filter(|(_, days)| **days >= aging.limit_days)
        .map(|(client, _)| client)
        .collect();

    let kept = table.filter(|row| {
        parse_due_date(&row[due_idx]).is_some()
            && critical.contains(&row[client_idx].trim().to_string())
    });

    info!(
        "Aging filter on '{}': clients={} critical={} rows_kept={} limit_days={}",
        table.name(),
        oldest.len(),
        critical.len(),
        kept.len(),
        aging.limit_days
    );
    Ok(kept)
}

/// Runs [`tratar`] as a job step.
pub struct TreatmentStep {
    name: String,
    config: TreatmentConfig,
}

impl TreatmentStep {
    pub fn new(name: &str, config: TreatmentConfig) -> Self {
        Self {
            name: name.to_owned(),
            config,
        }
    }
}

impl Step for TreatmentStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, execution: &mut StepExecution) -> Result<(), BatchError> {
        let stats = tratar(&self.config)?;
        execution.read_count = stats.input_rows;
        execution.write_count = stats.output_rows;
        execution.skip_count = stats.missing_key + stats.duplicates + stats.aged_out;
        execution.output_file = Some(stats.output_file);
        if stats.output_rows == 0 {
            execution.status = StepStatus::Empty;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::{config::KeySpec, item::csv::csv_reader::load};

    fn config(dir: &std::path::Path) -> TreatmentConfig {
        TreatmentConfig {
            name: "emccamp".into(),
            input: dir.join("Emccamp.csv"),
            output_dir: dir.join("emccamp_tratada"),
            output_name: "emccamp_tratada".into(),
            key: KeySpec::composite(&["CONTRATO", "PARCELA"], "-", "CHAVE"),
            text_columns: vec!["NOME".into()],
            decimal_columns: vec!["VALOR".into()],
            date_columns: vec!["VENCIMENTO".into()],
            required_columns: vec!["CPF".into()],
            aging: None,
            delimiter: ';',
        }
    }

    fn raw() -> Table {
        Table::from_rows(
            "raw",
            ["CONTRATO", "PARCELA", "NOME", "VALOR", "VENCIMENTO", "CPF"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            vec![
                ["10", "1", " Ana   Maria ", "1.234,56", "01/02/2024", "1"],
                ["10", "1", "Ana", "1,00", "01/02/2024", "1"],
                ["11", "", "Bia", "2,00", "01/03/2024", "2"],
                ["12", "3", "Caio", "abc", "2024-03-01", "3"],
            ]
            .iter()
            .map(|r| r.iter().map(|v| v.to_string()).collect())
            .collect(),
        )
        .unwrap()
    }

    #[test]
    fn treats_keys_and_columns() {
        let dir = TempDir::new().unwrap();
        let (table, counts) = treat_table(&config(dir.path()), &raw()).unwrap();

        assert_eq!(counts.missing_key, 1);
        assert_eq!(counts.duplicates, 1);
        assert_eq!(table.len(), 2);
        assert_eq!(table.columns().last().unwrap(), "CHAVE");

        let first = &table.rows()[0];
        assert_eq!(table.value(first, "CHAVE"), Some("10-1"));
        assert_eq!(table.value(first, "NOME"), Some("Ana Maria"));
        assert_eq!(table.value(first, "VALOR"), Some("1234.56"));
        assert_eq!(table.value(first, "VENCIMENTO"), Some("01/02/2024 00:00:00"));

        let second = &table.rows()[1];
        assert_eq!(table.value(second, "VALOR"), Some(""));
    }

    #[test]
    fn missing_required_column_is_reported() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.required_columns.push("STATUS".into());
        let err = treat_table(&config, &raw()).unwrap_err();
        assert!(matches!(err, BatchError::MissingColumn { ref column, .. } if column == "STATUS"));
    }

    #[test]
    fn aging_keeps_whole_critical_clients() {
        let table = Table::from_rows(
            "vic",
            vec!["CPF".into(), "VENCIMENTO".into()],
            vec![
                vec!["A".into(), "01/01/2024".into()],
                vec!["A".into(), "25/03/2024".into()],
                vec!["B".into(), "20/03/2024".into()],
                vec!["C".into(), "invalida".into()],
            ],
        )
        .unwrap();
        let aging = AgingFilter {
            client_column: "CPF".into(),
            due_column: "VENCIMENTO".into(),
            limit_days: 30,
            reference_date: NaiveDate::from_ymd_opt(2024, 3, 31),
        };

        let kept = filter_by_aging(&table, &aging).unwrap();
        let clients: Vec<&str> = kept.rows().iter().map(|r| r[0].as_str()).collect();
        assert_eq!(clients, vec!["A", "A"]);
    }

    #[test]
    fn due_dates() {
        assert_eq!(parse_due_date("31/01/2024"), NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(parse_due_date("2024-01-31 00:00:00"), NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(parse_due_date("2024-01-31T10:00:00"), NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(parse_due_date(""), None);
        assert_eq!(parse_due_date("31/02/2024"), None);
    }

    #[test]
    fn tratar_reads_and_saves() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Emccamp.csv"),
            "CONTRATO;PARCELA;NOME;VALOR;VENCIMENTO;CPF\n10;1;Ana;1,00;01/02/2024;1\n",
        )
        .unwrap();

        let stats = tratar(&config(dir.path())).unwrap();

        assert_eq!(stats.input_rows, 1);
        assert_eq!(stats.output_rows, 1);
        assert!(stats.output_file.ends_with("emccamp_tratada/emccamp_tratada.zip"));

        let saved = load("emccamp", &stats.output_file).unwrap();
        assert_eq!(saved.value(&saved.rows()[0], "CHAVE"), Some("10-1"));
        assert_eq!(saved.value(&saved.rows()[0], "VALOR"), Some("1.00"));
    }

    #[test]
    fn step_reports_counts() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Emccamp.csv"),
            "CONTRATO;PARCELA;NOME;VALOR;VENCIMENTO;CPF\n10;;Ana;1,00;01/02/2024;1\n",
        )
        .unwrap();

        let step = TreatmentStep::new("tratar_emccamp", config(dir.path()));
        let mut execution = StepExecution::new(step.name());
        step.execute(&mut execution).unwrap();

        assert_eq!(execution.read_count, 1);
        assert_eq!(execution.write_count, 0);
        assert_eq!(execution.skip_count, 1);
        assert_eq!(execution.status, StepStatus::Empty);
    }
}
