//! # Record Parser Integration Tests
//!
//! Raw notary collection files, fixed-width and delimited, through the
//! collection extractor.

pub mod common;

use std::fs;

use anyhow::Result;
use batimento::{
    item::{
        csv::csv_reader::load,
        record::{RecordLayout, RecordParser},
    },
    processor::extract::{CobrancaFileExtractor, Extractor},
};
use tempfile::TempDir;

const WIDTH: usize = 16;

fn fixed(cells: &[&str]) -> String {
    cells.iter().map(|c| format!("{c:<WIDTH$}")).collect()
}

fn header() -> String {
    fixed(&[
        "Protocolo", "VrTitulo", "DtAnuencia", "Devedor", "Endereco", "Cidade", "Cep",
        "CpfCnpj", "Intimado", "Custas", "Credor",
    ])
}

#[test]
fn fixed_width_report_is_sliced_and_padded() -> Result<()> {
    let full = fixed(&[
        "1001", "150,00", "01/02/2024", "Ana Souza", "Rua A 10", "Recife", "50000-000",
        "", "", "", "Banco Um",
    ]);
    // Ends inside the Cidade column: the remaining columns come out empty.
    let short = "1002            99,90           02/02/2024      Bruno           Rua B 2         Oli";
    let content = format!("{}\n{}\n\n{}\nshort;line\n", header(), full, short);

    let parser = RecordParser::new(RecordLayout::tabelionato());
    let (table, report) = parser.parse("tabelionato", &content)?;

    assert!(report.header);
    assert!(report.fixed_width);
    assert_eq!(report.accepted, 2);
    assert_eq!(report.blank, 1);
    assert_eq!(report.dropped, 1);

    let first = &table.rows()[0];
    assert_eq!(table.value(first, "Devedor"), Some("Ana Souza"));
    assert_eq!(table.value(first, "Cep"), Some("50000000"));
    assert_eq!(table.value(first, "Credor"), Some("Banco Um"));

    let second = &table.rows()[1];
    assert_eq!(table.value(second, "Cidade"), Some("Oli"));
    assert_eq!(table.value(second, "Credor"), Some(""));
    Ok(())
}

#[test]
fn delimited_report_mines_the_creditor_column() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("cobranca.txt");
    let mut content = vec![0xEF, 0xBB, 0xBF];
    content.extend_from_slice(
        "Protocolo;VrTitulo;DtAnuencia;Devedor;Endereco;Cidade;Cep;CpfCnpj;Intimado;Custas;Credor\n\
         2001;10,00;01/02/2024;Ana;Rua A;Recife;50000-000;;;;Banco X VERDADEIRO 123.456.789-01\n\
         2002;10,00;01/02/2024;Bia;Rua B;Recife;50000-000\n"
            .as_bytes(),
    );
    // invalid UTF-8 byte in the middle of a name
    content.extend_from_slice(b"2003;5;01/02/2024;Ca\xFFio;Rua C;Olinda;53000-000;;;;Banco Y\n");
    fs::write(&input, content)?;

    let extraction = CobrancaFileExtractor::new(&input, dir.path().join("out"), "2024-05-02")
        .extract()?;
    assert_eq!(extraction.records, 2);

    let table = load("tabelionato", &extraction.path)?;
    let first = &table.rows()[0];
    assert_eq!(table.value(first, "Intimado"), Some("True"));
    assert_eq!(table.value(first, "CpfCnpj"), Some("123.456.789-01"));
    assert_eq!(table.value(first, "Credor"), Some("Banco X"));
    assert_eq!(table.value(&table.rows()[1], "Devedor"), Some("Caio"));
    assert_eq!(table.first_value("DataExtracao"), Some("2024-05-02"));
    Ok(())
}
