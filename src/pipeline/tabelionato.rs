//! Notary office (Tabelionato) portfolio: collection report and costs come
//! from the notary, open titles from MAX, and protocols that left the report
//! are written off.

use std::path::Path;

use crate::{
    config::{
        default_baixa_layout, BaixaConfig, CostsInput, KeySpec, StatusFilter, TableInput,
        TreatmentConfig,
    },
    processor::extract::{CobrancaFileExtractor, CustasFileExtractor, EXTRACTION_DATE_COLUMN},
    BatchError,
};

use super::{treated_path, Layout, Pipeline, PipelineConfig};

const MAX_COLUMNS: &[&str] = &[
    "PARCELA",
    "STATUS_TITULO",
    "NOME_RAZAO_SOCIAL",
    "CPFCNPJ_CLIENTE",
    "CNPJ_CREDOR",
    "VALOR",
    "VENCIMENTO",
];

/// Stage configuration for a Tabelionato deployment rooted at `base_dir`.
pub fn config<P: AsRef<Path>>(base_dir: P) -> PipelineConfig {
    let layout = Layout::new(base_dir);
    let tratar_max = layout.max_treatment(MAX_COLUMNS);

    let tratar_fonte = TreatmentConfig {
        name: "tabelionato".to_string(),
        input: layout.input("tabelionato").join("Tabelionato.zip"),
        output_dir: layout.output("tabelionato_tratada"),
        output_name: "tabelionato_tratado".to_string(),
        key: KeySpec::single("Protocolo", "CHAVE"),
        text_columns: vec!["Devedor".to_string(), "Credor".to_string()],
        decimal_columns: Vec::new(),
        date_columns: Vec::new(),
        required_columns: vec!["Protocolo".to_string(), EXTRACTION_DATE_COLUMN.to_string()],
        aging: None,
        delimiter: ';',
    };

    let batimento = layout.batimento("tabelionato", &tratar_fonte);
    let baixa = BaixaConfig {
        max: TableInput::new("max", treated_path(&tratar_max), "CHAVE"),
        source: TableInput::new("tabelionato", treated_path(&tratar_fonte), "CHAVE"),
        costs: CostsInput::new(layout.input("tabelionato custas")),
        status: StatusFilter::default(),
        extraction_date_column: EXTRACTION_DATE_COLUMN.to_string(),
        layout: default_baixa_layout(),
        output_dir: layout.output("baixa"),
        prefix: "baixa_tabelionato".to_string(),
        decimal_separator: ',',
    };

    PipelineConfig {
        name: "tabelionato".to_string(),
        base_dir: layout.base_dir().to_path_buf(),
        decimal_separator: ',',
        tratar_max,
        tratar_fonte,
        batimento,
        devolucao: None,
        baixa: Some(baixa),
    }
}

impl Pipeline {
    /// Tabelionato pipeline, ending with the baixa.
    pub fn tabelionato<P: AsRef<Path>>(base_dir: P) -> Result<Self, BatchError> {
        Self::new(config(base_dir))
    }

    /// Collection report received on `extraction_date`, saved under
    /// `data/input/tabelionato`.
    pub fn cobranca_extractor<P: AsRef<Path>>(
        &self,
        input: P,
        extraction_date: &str,
    ) -> CobrancaFileExtractor {
        CobrancaFileExtractor::new(input, self.layout().input("tabelionato"), extraction_date)
    }

    /// Costs report received on `extraction_date`, saved under
    /// `data/input/tabelionato custas`.
    pub fn custas_extractor<P: AsRef<Path>>(
        &self,
        input: P,
        extraction_date: &str,
    ) -> CustasFileExtractor {
        CustasFileExtractor::new(input, self.layout().input("tabelionato custas"), extraction_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_chain_through_treated_files() {
        let config = config("/srv/tabelionato");
        config.validate().unwrap();

        let baixa = config.baixa.as_ref().unwrap();
        assert_eq!(baixa.max.path, treated_path(&config.tratar_max));
        assert_eq!(baixa.source.path, config.batimento.left.path);
        assert!(baixa.costs.path.ends_with("data/input/tabelionato custas"));
        assert!(config.devolucao.is_none());
    }

    #[test]
    fn json_decimal_separator_reaches_the_baixa() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.decimal_separator = '.';
        let path = dir.path().join("tabelionato.json");
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        let pipeline = Pipeline::from_json(&path).unwrap();
        assert_eq!(pipeline.config().baixa.as_ref().unwrap().decimal_separator, '.');
    }

    #[test]
    fn decimal_separator_reaches_the_baixa() {
        let pipeline = Pipeline::tabelionato("/srv").unwrap().decimal_separator('.');
        assert_eq!(pipeline.config().baixa.as_ref().unwrap().decimal_separator, '.');
    }
}
