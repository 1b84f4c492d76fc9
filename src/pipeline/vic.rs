//! Vic portfolio. Only clients with at least one title overdue by
//! [`AGING_LIMIT_DAYS`] are kept from the client base.

use std::path::Path;

use crate::{
    config::{AgingFilter, KeySpec, TreatmentConfig},
    BatchError,
};

use super::{Layout, Pipeline, PipelineConfig};

/// Minimum age, in days, of a client's oldest due title.
pub const AGING_LIMIT_DAYS: i64 = 90;

/// Vic stages under `base_dir`.
pub fn config<P: AsRef<Path>>(base_dir: P) -> PipelineConfig {
    let layout = Layout::new(base_dir);

    let tratar_fonte = TreatmentConfig {
        name: "vic".to_string(),
        input: layout.input("vic").join("VicCandiotto.zip"),
        output_dir: layout.output("vic_tratada"),
        output_name: "vic_tratada".to_string(),
        key: KeySpec::single("CHAVE", "CHAVE"),
        text_columns: vec!["NOME_RAZAO_SOCIAL".to_string()],
        decimal_columns: vec!["VALOR".to_string()],
        date_columns: Vec::new(),
        required_columns: vec!["CPF_CNPJ".to_string(), "VENCIMENTO".to_string()],
        aging: Some(AgingFilter {
            client_column: "CPF_CNPJ".to_string(),
            due_column: "VENCIMENTO".to_string(),
            limit_days: AGING_LIMIT_DAYS,
            reference_date: None,
        }),
        delimiter: ';',
    };

    PipelineConfig {
        name: "vic".to_string(),
        base_dir: layout.base_dir().to_path_buf(),
        decimal_separator: ',',
        tratar_max: layout.max_treatment(&["PARCELA", "STATUS_TITULO"]),
        batimento: layout.batimento("vic", &tratar_fonte),
        devolucao: Some(layout.devolucao("vic", &tratar_fonte)),
        tratar_fonte,
        baixa: None,
    }
}

impl Pipeline {
    /// Vic pipeline with batimento and devolução.
    pub fn vic<P: AsRef<Path>>(base_dir: P) -> Result<Self, BatchError> {
        Self::new(config(base_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vic_has_devolucao_and_aging() {
        let config = config("/srv/vic");
        config.validate().unwrap();
        assert!(config.devolucao.is_some());
        assert!(config.baixa.is_none());
        assert_eq!(config.tratar_fonte.aging.as_ref().unwrap().limit_days, 90);
    }
}
