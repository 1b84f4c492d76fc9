//! Pipeline variants.
//!
//! A [`Pipeline`] bundles the configuration of every stage of one client
//! portfolio and exposes them as plain calls (`tratar_max`,
//! `executar_batimento`, ...) or as a single job with [`Pipeline::run_full`].
//! Each variant lives behind its own cargo feature.
//!
//! ```no_run
//! # #[cfg(feature = "vic")]
//! # fn main() -> Result<(), batimento::BatchError> {
//! use batimento::pipeline::Pipeline;
//!
//! let pipeline = Pipeline::vic("/srv/vic")?;
//! let execution = pipeline.run_full()?;
//! println!("{} step(s)", execution.steps.len());
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "vic"))]
//! # fn main() {}
//! ```

use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    config::{
        load_json, BaixaConfig, KeySpec, ReconciliationConfig, StatusFilter, TableInput,
        TreatmentConfig,
    },
    core::{
        job::{Job, JobBuilder, JobExecution},
        step::Step,
    },
    processor::{
        baixa::{executar_baixa, BaixaResult, BaixaStep},
        batimento::{self, Direction, ReconciliationStats, ReconciliationStep},
        extract::{Extraction, Extractor, TableFileExtractor},
        treatment::{tratar, TreatmentStats, TreatmentStep},
    },
    recon::judicial::JudicialConfig,
    BatchError,
};

#[cfg(feature = "emccamp")]
pub mod emccamp;
#[cfg(feature = "tabelionato")]
pub mod tabelionato;
#[cfg(feature = "vic")]
pub mod vic;

/// Standard directory layout under a base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    base_dir: PathBuf,
}

impl Layout {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `data/input/{name}`
    pub fn input(&self, name: &str) -> PathBuf {
        self.base_dir.join("data").join("input").join(name)
    }

    /// `data/output/{name}`
    pub fn output(&self, name: &str) -> PathBuf {
        self.base_dir.join("data").join("output").join(name)
    }

    /// MAX extraction, `data/input/max/MaxSmart.zip`.
    pub fn max_input(&self) -> PathBuf {
        self.input("max").join("MaxSmart.zip")
    }

    /// Judicial clients reference, `data/input/judicial/ClientesJudiciais.zip`.
    pub fn judicial_reference(&self) -> PathBuf {
        self.input("judicial").join("ClientesJudiciais.zip")
    }

    /// Treatment of the MAX extraction shared by every variant: `PARCELA`
    /// becomes the `CHAVE` key and the title columns are normalized.
    pub fn max_treatment(&self, required_columns: &[&str]) -> TreatmentConfig {
        TreatmentConfig {
            name: "max".to_string(),
            input: self.max_input(),
            output_dir: self.output("max_tratada"),
            output_name: "max_tratada".to_string(),
            key: KeySpec::single("PARCELA", "CHAVE"),
            text_columns: vec!["NOME_RAZAO_SOCIAL".to_string()],
            decimal_columns: vec!["VALOR".to_string()],
            date_columns: Vec::new(),
            required_columns: required_columns.iter().map(|c| c.to_string()).collect(),
            aging: None,
            delimiter: ';',
        }
    }

    /// Source − MAX on the treated tables.
    pub fn batimento(&self, variant: &str, source: &TreatmentConfig) -> ReconciliationConfig {
        ReconciliationConfig {
            name: format!("batimento_{variant}"),
            left: TableInput::new(variant, treated_path(source), &source.key.target),
            right: TableInput::new("max", self.output("max_tratada").join("max_tratada.zip"), "CHAVE"),
            normalization: Default::default(),
            open_status: None,
            judicial: JudicialConfig::new(self.judicial_reference()),
            output_dir: self.output("batimento"),
            prefix: format!("{variant}_batimento"),
        }
    }

    /// Open MAX − source on the treated tables.
    pub fn devolucao(&self, variant: &str, source: &TreatmentConfig) -> ReconciliationConfig {
        ReconciliationConfig {
            name: format!("devolucao_{variant}"),
            left: TableInput::new("max", self.output("max_tratada").join("max_tratada.zip"), "CHAVE"),
            right: TableInput::new(variant, treated_path(source), &source.key.target),
            normalization: Default::default(),
            open_status: Some(StatusFilter::default()),
            judicial: JudicialConfig::new(self.judicial_reference()),
            output_dir: self.output("devolucao"),
            prefix: format!("{variant}_devolucao"),
        }
    }
}

/// Archive written by a treatment stage.
pub fn treated_path(config: &TreatmentConfig) -> PathBuf {
    config.output_dir.join(format!("{}.zip", config.output_name))
}

/// Configuration of every stage of one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Job name, also used in log messages.
    pub name: String,
    /// Root of the `data/input` and `data/output` trees.
    pub base_dir: PathBuf,
    /// Decimal mark of the monetary columns written for downstream systems.
    /// Overrides the separator of the baixa stage.
    pub decimal_separator: char,
    pub tratar_max: TreatmentConfig,
    pub tratar_fonte: TreatmentConfig,
    pub batimento: ReconciliationConfig,
    #[serde(default)]
    pub devolucao: Option<ReconciliationConfig>,
    #[serde(default)]
    pub baixa: Option<BaixaConfig>,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), BatchError> {
        if self.name.trim().is_empty() {
            return Err(BatchError::Configuration("pipeline: name is required".to_string()));
        }
        self.tratar_max.validate()?;
        self.tratar_fonte.validate()?;
        self.batimento.validate()?;
        if let Some(devolucao) = &self.devolucao {
            devolucao.validate()?;
        }
        if let Some(baixa) = &self.baixa {
            baixa.validate()?;
        }
        Ok(())
    }
}

/// One client portfolio, ready to run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Validates `config` eagerly.
    pub fn new(config: PipelineConfig) -> Result<Self, BatchError> {
        config.validate()?;
        let separator = config.decimal_separator;
        Ok(Self { config }.decimal_separator(separator))
    }

    /// Loads and validates a JSON pipeline configuration.
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self, BatchError> {
        Self::new(load_json(path)?)
    }

    /// Validated configuration of every stage.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Overrides the decimal separator of every stage writing money columns.
    pub fn decimal_separator(mut self, separator: char) -> Self {
        self.config.decimal_separator = separator;
        if let Some(baixa) = self.config.baixa.as_mut() {
            baixa.decimal_separator = separator;
        }
        self
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.config.base_dir)
    }

    /// Runs `extractors` in order; the first failure stops the extraction.
    pub fn extrair(&self, extractors: &[&dyn Extractor]) -> Result<Vec<Extraction>, BatchError> {
        let mut extractions = Vec::with_capacity(extractors.len());
        for extractor in extractors {
            let extraction = extractor.extract()?;
            info!(
                "{}: extracted {} ({} records) to {}",
                self.config.name,
                extractor.name(),
                extraction.records,
                extraction.path.display()
            );
            extractions.push(extraction);
        }
        Ok(extractions)
    }

    /// Copies an already-extracted MAX file into `data/input/max/MaxSmart.zip`.
    pub fn max_extractor<P: AsRef<Path>>(&self, input: P) -> TableFileExtractor {
        TableFileExtractor::from_file(input, self.layout().input("max"), "MaxSmart")
    }

    /// Treats the MAX extraction.
    pub fn tratar_max(&self) -> Result<TreatmentStats, BatchError> {
        tratar(&self.config.tratar_max)
    }

    /// Treats the client source.
    pub fn tratar_fonte(&self) -> Result<TreatmentStats, BatchError> {
        tratar(&self.config.tratar_fonte)
    }

    /// Source − MAX, split into judicial and extrajudicial files.
    pub fn executar_batimento(&self) -> Result<ReconciliationStats, BatchError> {
        batimento::executar_batimento(&self.config.batimento)
    }

    /// Fails with a configuration error on variants without devolução.
    pub fn executar_devolucao(&self) -> Result<ReconciliationStats, BatchError> {
        let config = self.config.devolucao.as_ref().ok_or_else(|| {
            BatchError::Configuration(format!("{}: no devolucao stage", self.config.name))
        })?;
        batimento::executar_devolucao(config)
    }

    /// Fails with a configuration error on variants without baixa.
    pub fn executar_baixa(&self) -> Result<BaixaResult, BatchError> {
        let config = self.config.baixa.as_ref().ok_or_else(|| {
            BatchError::Configuration(format!("{}: no baixa stage", self.config.name))
        })?;
        executar_baixa(config)
    }

    /// Treat MAX, treat the source, batimento, then devolução and baixa when
    /// the variant has them, as one job.
    pub fn run_full(&self) -> Result<JobExecution, BatchError> {
        let config = &self.config;
        let tratar_max = TreatmentStep::new("tratar_max", config.tratar_max.clone());
        let tratar_fonte = TreatmentStep::new("tratar_fonte", config.tratar_fonte.clone());
        let batimento = ReconciliationStep::new(
            "batimento",
            Direction::Batimento,
            config.batimento.clone(),
        );
        let devolucao = config
            .devolucao
            .clone()
            .map(|c| ReconciliationStep::new("devolucao", Direction::Devolucao, c));
        let baixa = config.baixa.clone().map(|c| BaixaStep::new("baixa", c));

        let mut builder = JobBuilder::new()
            .name(config.name.clone())
            .start(&tratar_max)
            .next(&tratar_fonte)
            .next(&batimento);
        if let Some(step) = &devolucao {
            builder = builder.next(step as &dyn Step);
        }
        if let Some(step) = &baixa {
            builder = builder.next(step as &dyn Step);
        }

        builder.build().run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let layout = Layout::new("/srv/emccamp");
        assert_eq!(
            layout.max_input(),
            PathBuf::from("/srv/emccamp/data/input/max/MaxSmart.zip")
        );
        assert_eq!(
            layout.output("batimento"),
            PathBuf::from("/srv/emccamp/data/output/batimento")
        );
    }

    #[test]
    fn reconciliations_point_at_treated_tables() {
        let layout = Layout::new("/srv");
        let mut source = layout.max_treatment(&[]);
        source.output_dir = layout.output("vic_tratada");
        source.output_name = "vic_tratada".into();

        let batimento = layout.batimento("vic", &source);
        assert_eq!(batimento.left.path, PathBuf::from("/srv/data/output/vic_tratada/vic_tratada.zip"));
        assert!(batimento.open_status.is_none());

        let devolucao = layout.devolucao("vic", &source);
        assert_eq!(devolucao.left.name, "max");
        assert!(devolucao.open_status.is_some());
    }

    #[test]
    fn missing_stage_is_a_configuration_error() {
        let layout = Layout::new("/srv");
        let source = layout.max_treatment(&[]);
        let pipeline = Pipeline::new(PipelineConfig {
            name: "custom".into(),
            base_dir: "/srv".into(),
            decimal_separator: ',',
            tratar_max: layout.max_treatment(&[]),
            batimento: layout.batimento("custom", &source),
            tratar_fonte: source,
            devolucao: None,
            baixa: None,
        })
        .unwrap();

        assert!(pipeline.executar_devolucao().unwrap_err().is_configuration());
        assert!(pipeline.executar_baixa().unwrap_err().is_configuration());
    }
}
