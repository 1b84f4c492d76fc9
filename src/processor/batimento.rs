//! Batimento and devolução: the two directions of the reconciliation between
//! a client source and the MAX collection system.
//!
//! - batimento: source − MAX, the records MAX still has to receive;
//! - devolução: open MAX − source, the records to hand back.
//!
//! Both split the difference into judicial and extrajudicial portfolios and
//! save each non-empty one as its own archive.

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use log::{info, warn};

use crate::{
    config::{ReconciliationConfig, StatusFilter},
    core::{
        step::{Step, StepExecution, StepStatus},
        table::Table,
    },
    item::csv::csv_reader::load,
    recon::{anti_join::difference_by, judicial::JudicialSplitter},
    tasklet::zip::{save, timestamp, SaveOptions},
    BatchError,
};

/// Outcome of one batimento or devolução run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationStats {
    /// Rows read from the left table, before the status filter.
    pub left_rows: usize,
    /// Rows read from the right table.
    pub right_rows: usize,
    /// Left rows with no counterpart on the right.
    pub difference: usize,
    pub judicial: usize,
    pub extrajudicial: usize,
    /// Archives written, judicial first; empty when there is no difference.
    pub files: Vec<PathBuf>,
    pub duration: Duration,
}

/// Keeps rows whose status is open.
///
/// A table without the status column is passed through unchanged, with a warning.
pub fn filter_open(table: &Table, filter: &StatusFilter) -> Table {
    let Some(idx) = table.column_index(&filter.column) else {
        warn!(
            "Column '{}' not found in '{}'; status filter skipped, all {} rows kept",
            filter.column,
            table.name(),
            table.len()
        );
        return table.clone();
    };

    let open = table.filter(|row| filter.is_open(&row[idx]));
    info!(
        "Status filter on '{}': open={} total={}",
        table.name(),
        open.len(),
        table.len()
    );
    open
}

/// Source − MAX. The difference rows come from `config.left`.
pub fn executar_batimento(config: &ReconciliationConfig) -> Result<ReconciliationStats, BatchError> {
    info!("Batimento {}: {} - {}", config.name, config.left.name, config.right.name);
    reconcile(config)
}

/// Open MAX − source. The difference rows come from `config.left`.
pub fn executar_devolucao(config: &ReconciliationConfig) -> Result<ReconciliationStats, BatchError> {
    info!("Devolucao {}: {} - {}", config.name, config.left.name, config.right.name);
    if config.open_status.is_none() {
        warn!("Devolucao {} runs without a status filter", config.name);
    }
    reconcile(config)
}

fn reconcile(config: &ReconciliationConfig) -> Result<ReconciliationStats, BatchError> {
    config.validate()?;
    let start = Instant::now();

    let left = load(&config.left.name, &config.left.path)?;
    let right = load(&config.right.name, &config.right.path)?;
    let filtered = match &config.open_status {
        Some(filter) => filter_open(&left, filter),
        None => left.clone(),
    };

    let diff = difference_by(
        &filtered,
        &config.left.key,
        &right,
        &config.right.key,
        config.normalization,
    )?;

    let mut stats = ReconciliationStats {
        left_rows: left.len(),
        right_rows: right.len(),
        difference: diff.len(),
        judicial: 0,
        extrajudicial: 0,
        files: Vec::new(),
        duration: Duration::ZERO,
    };

    if diff.is_empty() {
        info!("{}: no difference between {} and {}", config.name, left.name(), right.name());
        stats.duration = start.elapsed();
        return Ok(stats);
    }

    let mut splitter = JudicialSplitter::new(config.judicial.clone());
    let (judicial, extrajudicial) = splitter.dividir_carteiras(&diff)?;
    stats.judicial = judicial.len();
    stats.extrajudicial = extrajudicial.len();

    let ts = timestamp();
    for (portfolio, table) in [("judicial", &judicial), ("extrajudicial", &extrajudicial)] {
        if table.is_empty() {
            continue;
        }
        let prefix = format!("{}_{}", config.prefix, portfolio);
        let path = save(table, &config.output_dir, &prefix, Some(&ts), SaveOptions::default())?;
        stats.files.push(path);
    }

    stats.duration = start.elapsed();
    info!(
        "{}: left={} right={} difference={} judicial={} extrajudicial={} duration={:?}",
        config.name,
        stats.left_rows,
        stats.right_rows,
        stats.difference,
        stats.judicial,
        stats.extrajudicial,
        stats.duration
    );
    Ok(stats)
}

/// Which direction a [`ReconciliationStep`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Batimento,
    Devolucao,
}

/// [`Step`] running one reconciliation direction.
pub struct ReconciliationStep {
    name: String,
    direction: Direction,
    config: ReconciliationConfig,
}

impl ReconciliationStep {
    pub fn new(name: &str, direction: Direction, config: ReconciliationConfig) -> Self {
        Self {
            name: name.to_owned(),
            direction,
            config,
        }
    }
}

impl Step for ReconciliationStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, execution: &mut StepExecution) -> Result<(), BatchError> {
        let stats = match self.direction {
            Direction::Batimento => executar_batimento(&self.config)?,
            Direction::Devolucao => executar_devolucao(&self.config)?,
        };
        execution.read_count = stats.left_rows;
        execution.write_count = stats.difference;
        execution.output_file = stats.files.first().cloned();
        execution.message = Some(format!(
            "judicial={} extrajudicial={}",
            stats.judicial, stats.extrajudicial
        ));
        if stats.difference == 0 {
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
    use crate::{config::TableInput, recon::judicial::JudicialConfig};

    fn write(dir: &std::path::Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn config(dir: &std::path::Path) -> ReconciliationConfig {
        let max = write(
            dir,
            "max.csv",
            "PARCELA;STATUS_TITULO;CPFCNPJ_CLIENTE\n1;aberto;111\n2;pago;222\n3;aberto;333\n",
        );
        let vic = write(
            dir,
            "vic.csv",
            "CHAVE;CPF_CNPJ;TIPO_FLUXO\n1;111;EXTRAJUDICIAL\n4;444;JUDICIAL\n5;555;EXTRAJUDICIAL\n",
        );
        ReconciliationConfig {
            name: "batimento_vic".into(),
            left: TableInput::new("vic", vic, "CHAVE"),
            right: TableInput::new("max", max, "PARCELA"),
            normalization: Default::default(),
            open_status: None,
            judicial: JudicialConfig::new(dir.join("missing.zip")),
            output_dir: dir.join("batimento"),
            prefix: "vic_batimento".into(),
        }
    }

    #[test]
    fn batimento_splits_and_saves_portfolios() {
        let dir = TempDir::new().unwrap();
        let stats = executar_batimento(&config(dir.path())).unwrap();

        assert_eq!(stats.difference, 2);
        assert_eq!(stats.judicial, 1);
        assert_eq!(stats.extrajudicial, 1);
        assert_eq!(stats.files.len(), 2);

        let judicial = load("j", &stats.files[0]).unwrap();
        assert_eq!(judicial.rows()[0][0], "4");
        let name = stats.files[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("vic_batimento_judicial_"));
    }

    #[test]
    fn devolucao_filters_open_titles() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        std::mem::swap(&mut config.left, &mut config.right);
        config.prefix = "vic_devolucao".into();
        config.open_status = Some(StatusFilter::default());

        let stats = executar_devolucao(&config).unwrap();

        assert_eq!(stats.left_rows, 3);
        assert_eq!(stats.difference, 1);
        assert_eq!(stats.judicial, 0);
        let only = load("e", &stats.files[0]).unwrap();
        assert_eq!(only.rows()[0][0], "3");
    }

    #[test]
    fn empty_difference_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.right = TableInput::new("same", config.left.path.clone(), "CHAVE");

        let stats = executar_batimento(&config).unwrap();
        assert_eq!(stats.difference, 0);
        assert!(stats.files.is_empty());
        assert!(!dir.path().join("batimento").exists());
    }

    #[test]
    fn missing_status_column_keeps_everything() {
        let table = Table::from_rows("t", vec!["K".into()], vec![vec!["1".into()]]).unwrap();
        assert_eq!(filter_open(&table, &StatusFilter::default()).len(), 1);
    }

    #[test]
    fn step_marks_empty_runs() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.right = TableInput::new("same", config.left.path.clone(), "CHAVE");

        let step = ReconciliationStep::new("batimento", Direction::Batimento, config);
        let mut execution = StepExecution::new("batimento");
        step.execute(&mut execution).unwrap();
        assert_eq!(execution.status, StepStatus::Empty);
    }
}
