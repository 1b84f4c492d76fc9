//! # Baixa Integration Tests
//!
//! Runs the Tabelionato pipeline from treated inputs to the settlement file.

pub mod common;

use std::fs;

use anyhow::Result;
use batimento::{
    core::step::StepStatus,
    item::csv::csv_reader::load,
    pipeline::Pipeline,
    processor::baixa::{validate_difference, BaixaStatus},
    BatchError,
};
use tempfile::TempDir;

use common::{init_logger, save_zip, table};

const MAX_COLUMNS: &[&str] = &[
    "PARCELA",
    "STATUS_TITULO",
    "NOME_RAZAO_SOCIAL",
    "CPFCNPJ_CLIENTE",
    "CNPJ_CREDOR",
    "VALOR",
    "VENCIMENTO",
];

const SOURCE_COLUMNS: &[&str] = &["Protocolo", "Devedor", "Credor", "DataExtracao"];

fn prepare(base: &std::path::Path, source_rows: &[&[&str]]) {
    let max = table(
        "max",
        MAX_COLUMNS,
        &[
            &["A", "aberto", "Ana  Souza", "111", "999", "1.234,50", "01/01/2024"],
            &["B", "pago", "Bia", "222", "999", "10,00", "02/01/2024"],
        ],
    );
    save_zip(&max, &base.join("data/input/max"), "MaxSmart");

    let source = table("tabelionato", SOURCE_COLUMNS, source_rows);
    save_zip(&source, &base.join("data/input/tabelionato"), "Tabelionato");

    let costs = table(
        "custas",
        &["Protocolo", "Valor Total Pago", "DataExtracao"],
        &[&["A", "50.00", "2024-05-02"]],
    );
    save_zip(
        &costs,
        &base.join("data/input/tabelionato custas"),
        "RecebimentoCustas_20240502_080000",
    );
}

#[test]
fn open_title_absent_from_source_is_written_off() -> Result<()> {
    init_logger();
    let dir = TempDir::new()?;
    prepare(dir.path(), &[]);

    let pipeline = Pipeline::tabelionato(dir.path())?;
    let execution = pipeline.run_full()?;

    assert_eq!(execution.steps.len(), 4);
    assert_eq!(execution.step("tratar_fonte").unwrap().status, StepStatus::Empty);
    assert_eq!(execution.step("batimento").unwrap().status, StepStatus::Empty);

    let baixa = execution.step("baixa").unwrap();
    assert_eq!(baixa.status, StepStatus::Success);
    assert_eq!(baixa.write_count, 1);
    assert_eq!(baixa.skip_count, 0);

    let written = load("baixa", baixa.output_file.as_ref().unwrap())?;
    let row = &written.rows()[0];
    assert_eq!(written.value(row, "NUMERO DOC"), Some("A"));
    assert_eq!(written.value(row, "NOME CLIENTE"), Some("Ana Souza"));
    assert_eq!(written.value(row, "VALOR DA PARCELA"), Some("1234,50"));
    assert_eq!(written.value(row, "STATUS ACORDO"), Some("2"));
    assert_eq!(written.value(row, "DT. PAGAMENTO"), Some("2024-05-02"));
    assert_eq!(written.value(row, "VALOR RECEBIDO"), Some("50,00"));
    Ok(())
}

#[test]
fn rerun_replaces_previous_settlement_files() -> Result<()> {
    let dir = TempDir::new()?;
    prepare(dir.path(), &[&["Z", "Zeca", "Banco", "2024-05-02 09:00:00"]]);
    let pipeline = Pipeline::tabelionato(dir.path())?;
    pipeline.tratar_max()?;
    pipeline.tratar_fonte()?;

    let baixa_dir = dir.path().join("data/output/baixa");
    fs::create_dir_all(&baixa_dir)?;
    fs::write(baixa_dir.join("baixa_tabelionato_20000101_000000.zip"), b"old")?;

    let result = pipeline.executar_baixa()?;

    assert_eq!(result.status, BaixaStatus::Sucesso);
    assert_eq!(fs::read_dir(&baixa_dir)?.count(), 1);
    let written = load("baixa", result.output_file.unwrap())?;
    assert_eq!(written.value(&written.rows()[0], "DT. PAGAMENTO"), Some("2024-05-02"));
    Ok(())
}

#[test]
fn protocol_still_in_source_is_not_written_off() -> Result<()> {
    let dir = TempDir::new()?;
    prepare(dir.path(), &[&["A", "Ana", "Banco", "2024-05-02"]]);
    let pipeline = Pipeline::tabelionato(dir.path())?;
    pipeline.tratar_max()?;
    pipeline.tratar_fonte()?;

    let result = pipeline.executar_baixa()?;
    assert_eq!(result.status, BaixaStatus::SemRegistros);
    assert!(result.output_file.is_none());
    Ok(())
}

#[test]
fn missing_treated_input_is_reported() -> Result<()> {
    let dir = TempDir::new()?;
    let pipeline = Pipeline::tabelionato(dir.path())?;

    let err = pipeline.executar_baixa().unwrap_err();
    assert!(matches!(err, BatchError::MissingInput(_)));
    assert!(err.is_configuration());
    Ok(())
}

#[test]
fn key_in_both_tables_is_an_invariant_violation() {
    let diff = table("diff", &["CHAVE"], &[&["A"], &["X"]]);
    let open_max = table("max", &["CHAVE"], &[&["A"], &["X"]]);
    let source = table("tabelionato", &["CHAVE"], &[&["X"]]);

    let err = validate_difference(&diff, "CHAVE", &open_max, "CHAVE", &source, "CHAVE")
        .unwrap_err();

    assert!(err.to_string().contains('X'));
    assert!(matches!(err, BatchError::InvariantViolation { total: 1, .. }));
}

#[test]
fn key_missing_from_open_max_is_an_invariant_violation() {
    let diff = table("diff", &["CHAVE"], &[&["A"]]);
    let open_max = table("max", &["CHAVE"], &[]);
    let source = table("tabelionato", &["CHAVE"], &[]);

    let err = validate_difference(&diff, "CHAVE", &open_max, "CHAVE", &source, "CHAVE")
        .unwrap_err();
    assert!(matches!(
        err,
        BatchError::InvariantViolation { ref check, .. } if check.contains("MAX")
    ));
}

#[test]
fn blank_key_in_open_max_and_difference_is_consistent() -> Result<()> {
    let open_max = table("max", &["CHAVE"], &[&[""], &["A"]]);
    let source = table("tabelionato", &["CHAVE"], &[]);
    let diff = batimento::recon::anti_join::difference(&open_max, "CHAVE", &source, "CHAVE")?;
    assert_eq!(diff.len(), 2);

    validate_difference(&diff, "CHAVE", &open_max, "CHAVE", &source, "CHAVE")?;
    Ok(())
}

#[test]
fn failed_job_reports_the_cause() -> Result<()> {
    let dir = TempDir::new()?;
    let pipeline = Pipeline::tabelionato(dir.path())?;

    let err = pipeline.run_full().unwrap_err();

    assert!(matches!(err, BatchError::Step { ref name, .. } if name == "tratar_max"));
    assert!(matches!(
        err.root_cause(),
        BatchError::MissingInput(path) if path.ends_with("MaxSmart.zip")
    ));
    assert!(err.to_string().contains("MaxSmart.zip"));
    Ok(())
}
