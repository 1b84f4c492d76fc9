#![cfg_attr(docsrs, feature(doc_cfg))]

/*!
 # Batimento

 Batch reconciliation pipelines between client portfolios (Tabelionato, Vic,
 Emccamp) and the MAX receivables system.

 Every pipeline reads tabular extracts, normalizes them, reconciles them by
 business key and writes CSV-in-ZIP artifacts for downstream systems.

 ## Core Concepts

- **Table:** an ordered set of named columns over string cells. Every stage
  takes tables and returns new ones; nothing is mutated in place.
- **Anti-join:** `difference(left, .., right, ..)` keeps the rows of `left`
  whose key has no counterpart in `right`. Directional by construction.
- **Stage:** one function per pipeline phase (`extrair`, `tratar_*`,
  `executar_batimento`, `executar_devolucao`, `executar_baixa`) returning a
  typed record of what it did.
- **Step / Job:** every stage has a `Step` adapter, and a `Job` runs steps in
  order, stopping at the first failure.

 ## Stages

| **Stage**          | **Module**                 | **Output**                                   |
|--------------------|----------------------------|----------------------------------------------|
| extrair            | `processor::extract`       | raw inputs saved under `data/input`          |
| tratar_*           | `processor::treatment`     | `{name}_tratada.zip` with a `CHAVE` key       |
| batimento          | `processor::batimento`     | source − MAX, judicial / extrajudicial files |
| devolução          | `processor::batimento`     | open MAX − source, judicial / extrajudicial  |
| baixa              | `processor::baixa`         | settlement layout for open titles no longer in the source |

 ## Features

| **Feature**   | **Description**                                  |
|---------------|--------------------------------------------------|
| tabelionato   | Notary office pipeline, with costs and baixa     |
| vic           | Vic pipeline, with the aging filter              |
| emccamp       | Emccamp pipeline, keyed `CONTRATO-PARCELA`       |
| full          | Enables all pipelines                            |

 ## Getting Started

```rust
use batimento::{
    core::table::Table,
    recon::{anti_join::difference, judicial::{JudicialConfig, JudicialSplitter}},
    BatchError,
};

fn main() -> Result<(), BatchError> {
    let max = Table::from_rows(
        "max",
        vec!["CHAVE".into()],
        vec![vec!["10-1".into()], vec!["10-2".into()]],
    )?;
    let source = Table::from_rows(
        "vic",
        vec!["CHAVE".into(), "TIPO_FLUXO".into()],
        vec![
            vec!["10-1".into(), "EXTRAJUDICIAL".into()],
            vec!["11-1".into(), "JUDICIAL".into()],
        ],
    )?;

    let only_source = difference(&source, "CHAVE", &max, "CHAVE")?;
    assert_eq!(only_source.len(), 1);

    let mut splitter = JudicialSplitter::new(JudicialConfig::new("ClientesJudiciais.zip"));
    let (judicial, extrajudicial) = splitter.dividir_carteiras(&only_source)?;
    assert_eq!(judicial.len(), 1);
    assert!(extrajudicial.is_empty());

    Ok(())
}
```

 A whole portfolio runs as one job:

```no_run
# #[cfg(feature = "tabelionato")]
# fn main() -> Result<(), batimento::BatchError> {
use batimento::pipeline::Pipeline;

let pipeline = Pipeline::tabelionato("/srv/tabelionato")?;
let execution = pipeline.run_full()?;
for step in &execution.steps {
    println!("{}: {:?}", step.name, step.status);
}
# Ok(())
# }
# #[cfg(not(feature = "tabelionato"))]
# fn main() {}
```
 */

/// Tables, steps and jobs
pub mod core;

/// Typed stage configuration
pub mod config;

/// Error types for batch operations
pub mod error;

#[doc(inline)]
pub use error::*;

/// Table readers, writers and the raw record parser
pub mod item;

/// Cell normalization (text, dates, decimals, documents)
pub mod normalize;

/// Pipeline stages
pub mod processor;

/// Anti-join and judicial split
pub mod recon;

/// Single-shot operations such as archive packaging
pub mod tasklet;

/// Pipeline variants
pub mod pipeline;
