//! Emccamp portfolio: installments are keyed `CONTRATO-PARCELA`.

use std::path::Path;

use crate::{
    config::{KeySpec, TreatmentConfig},
    BatchError,
};

use super::{Layout, Pipeline, PipelineConfig};

/// Emccamp stages under `base_dir`, keyed `CONTRATO-PARCELA`.
pub fn config<P: AsRef<Path>>(base_dir: P) -> PipelineConfig {
    let layout = Layout::new(base_dir);

    let tratar_fonte = TreatmentConfig {
        name: "emccamp".to_string(),
        input: layout.input("emccamp").join("Emccamp.zip"),
        output_dir: layout.output("emccamp_tratada"),
        output_name: "emccamp_tratada".to_string(),
        key: KeySpec::composite(&["CONTRATO", "PARCELA"], "-", "CHAVE"),
        text_columns: vec!["NOME_RAZAO_SOCIAL".to_string()],
        decimal_columns: vec!["VALOR".to_string()],
        date_columns: Vec::new(),
        required_columns: vec!["CPFCNPJ_CLIENTE".to_string()],
        aging: None,
        delimiter: ';',
    };

    PipelineConfig {
        name: "emccamp".to_string(),
        base_dir: layout.base_dir().to_path_buf(),
        decimal_separator: ',',
        tratar_max: layout.max_treatment(&["PARCELA", "STATUS_TITULO"]),
        batimento: layout.batimento("emccamp", &tratar_fonte),
        devolucao: Some(layout.devolucao("emccamp", &tratar_fonte)),
        tratar_fonte,
        baixa: None,
    }
}

impl Pipeline {
    /// Emccamp pipeline with batimento and devolução.
    pub fn emccamp<P: AsRef<Path>>(base_dir: P) -> Result<Self, BatchError> {
        Self::new(config(base_dir))
    }
}
