//! The pipeline stages, each one a plain function returning a typed record
//! plus a [`Step`](crate::core::step::Step) adapter for jobs.

/// Write-off derivation from open MAX titles and costs.
pub mod baixa;
/// Batimento and devolução with the judicial split.
pub mod batimento;
/// Extractors bringing raw inputs into the pipeline.
pub mod extract;
/// Column normalization and business keys (`tratar_*`).
pub mod treatment;

pub use baixa::{executar_baixa, BaixaResult, BaixaStatus, BaixaStep};
pub use batimento::{
    executar_batimento, executar_devolucao, Direction, ReconciliationStats, ReconciliationStep,
};
pub use extract::{
    CobrancaFileExtractor, CustasFileExtractor, ExtractStep, Extraction, Extractor,
    TableFileExtractor,
};
pub use treatment::{tratar, TreatmentStats, TreatmentStep};
