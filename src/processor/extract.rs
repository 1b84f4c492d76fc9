//! Extractors: bring a raw input into the pipeline as a saved table.
//!
//! Every extractor returns where its table was written and how many records it
//! holds. Network and database collectors are outside this crate; they hand
//! over files or tables that the types below persist.

use std::path::{Path, PathBuf};

use log::{info, warn};
use rust_decimal::Decimal;

use crate::{
    core::{
        item::TableSource,
        step::{Step, StepExecution, StepStatus},
        table::Table,
    },
    item::{
        csv::csv_reader::CsvTableReaderBuilder,
        record::{RecordLayout, RecordParser},
    },
    normalize::{format_decimal, normalize_decimal},
    tasklet::zip::{save, timestamp, SaveOptions},
    BatchError,
};

/// Column stamped on every extracted table.
pub const EXTRACTION_DATE_COLUMN: &str = "DataExtracao";
/// Protocol column joining costs to titles.
pub const COSTS_KEY_COLUMN: &str = "Protocolo";
/// Computed paid total of a costs row.
pub const COSTS_TOTAL_COLUMN: &str = "Valor Total Pago";

/// Output of one extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Saved archive.
    pub path: PathBuf,
    pub records: usize,
}

/// A data source feeding the pipeline.
pub trait Extractor {
    /// Short name used in logs and as the step name.
    fn name(&self) -> &str;

    /// Reads the source and saves it as a table archive.
    fn extract(&self) -> Result<Extraction, BatchError>;
}

/// Extracted tables are re-read by spreadsheet users, hence the BOM.
fn extraction_options() -> SaveOptions {
    SaveOptions {
        bom: true,
        ..SaveOptions::default()
    }
}

fn stamp(table: &Table, extraction_date: &str) -> Result<Table, BatchError> {
    table.with_column(EXTRACTION_DATE_COLUMN, vec![extraction_date.to_string(); table.len()])
}

/// Raw collection text file (fixed-width or delimited) of the notary office.
pub struct CobrancaFileExtractor {
    input: PathBuf,
    output_dir: PathBuf,
    prefix: String,
    extraction_date: String,
    parser: RecordParser,
}

impl CobrancaFileExtractor {
    /// Tabelionato layout, saved as `{output_dir}/Tabelionato.zip`.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output_dir: Q, extraction_date: &str) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
            prefix: "Tabelionato".to_string(),
            extraction_date: extraction_date.to_owned(),
            parser: RecordParser::new(RecordLayout::tabelionato()),
        }
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_owned();
        self
    }

    /// Replaces the Tabelionato record layout.
    pub fn layout(mut self, layout: RecordLayout) -> Self {
        self.parser = RecordParser::new(layout);
        self
    }
}

impl Extractor for CobrancaFileExtractor {
    fn name(&self) -> &str {
        "cobranca"
    }

    fn extract(&self) -> Result<Extraction, BatchError> {
        let (table, report) = self.parser.parse_file(&self.prefix, &self.input)?;
        info!(
            "Parsed {}: accepted={} dropped={} blank={} fixed_width={}",
            self.input.display(),
            report.accepted,
            report.dropped,
            report.blank,
            report.fixed_width
        );
        if table.is_empty() {
            return Err(BatchError::ItemReader(format!(
                "no valid record in {}",
                self.input.display()
            )));
        }

        let table = stamp(&table, &self.extraction_date)?;
        let path = save(&table, &self.output_dir, &self.prefix, None, extraction_options())?;
        Ok(Extraction {
            path,
            records: table.len(),
        })
    }
}

/// Raw `;` costs (custas) file of the notary office.
pub struct CustasFileExtractor {
    input: PathBuf,
    output_dir: PathBuf,
    prefix: String,
    extraction_date: String,
}

impl CustasFileExtractor {
    /// Saved as `{output_dir}/RecebimentoCustas_{timestamp}.zip`.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output_dir: Q, extraction_date: &str) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
            prefix: "RecebimentoCustas".to_string(),
            extraction_date: extraction_date.to_owned(),
        }
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_owned();
        self
    }
}

/// Keeps word characters only: `"12.345-6"` becomes `"123456"`.
fn word_chars(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// Adds the paid total: costs paid + cancellation paid.
///
/// Both source columns are found by name, case-insensitively; when one is
/// missing the table is returned unchanged.
pub fn with_total_paid(table: &Table) -> Result<Table, BatchError> {
    let mut costs = None;
    let mut cancellation = None;
    for (idx, column) in table.columns().iter().enumerate() {
        let lower = column.to_lowercase();
        if lower.contains("custas") && lower.contains("pago") {
            costs = Some(idx);
        } else if lower.contains("cancelamento") && lower.contains("pago") {
            cancellation = Some(idx);
        }
    }

    let (Some(costs), Some(cancellation)) = (costs, cancellation) else {
        warn!("'{}': paid columns not found, '{COSTS_TOTAL_COLUMN}' not computed", table.name());
        return Ok(table.clone());
    };

    let amount = |value: &str| normalize_decimal(value).unwrap_or(Decimal::ZERO);
    let totals = table
        .rows()
        .iter()
        .map(|row| format_decimal(amount(&row[costs]) + amount(&row[cancellation]), '.'))
        .collect();
    table.with_column(COSTS_TOTAL_COLUMN, totals)
}

impl Extractor for CustasFileExtractor {
    fn name(&self) -> &str {
        "custas"
    }

    fn extract(&self) -> Result<Extraction, BatchError> {
        let table = CsvTableReaderBuilder::new()
            .delimiter(b';')
            .from_path("custas", &self.input)
            .read()?;

        let table = if table.has_column(COSTS_KEY_COLUMN) {
            table.map_column(COSTS_KEY_COLUMN, word_chars)?
        } else {
            warn!("'{}' has no '{COSTS_KEY_COLUMN}' column", self.input.display());
            table
        };
        let table = stamp(&with_total_paid(&table)?, &self.extraction_date)?;

        let path = save(
            &table,
            &self.output_dir,
            &self.prefix,
            Some(&timestamp()),
            extraction_options(),
        )?;
        Ok(Extraction {
            path,
            records: table.len(),
        })
    }
}

/// Persists a table obtained elsewhere (MAX query, client API, judicial
/// database) as `{output_dir}/{output_name}.zip`.
pub struct TableFileExtractor {
    source: Box<dyn TableSource>,
    output_dir: PathBuf,
    output_name: String,
}

impl TableFileExtractor {
    pub fn new<P: AsRef<Path>>(source: Box<dyn TableSource>, output_dir: P, output_name: &str) -> Self {
        Self {
            source,
            output_dir: output_dir.as_ref().to_path_buf(),
            output_name: output_name.to_owned(),
        }
    }

    /// Copies a CSV or ZIP table file.
    pub fn from_file<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output_dir: Q, output_name: &str) -> Self {
        let reader = CsvTableReaderBuilder::new().from_path(output_name, input);
        Self::new(Box::new(reader), output_dir, output_name)
    }
}

impl Extractor for TableFileExtractor {
    fn name(&self) -> &str {
        self.source.name()
    }

    fn extract(&self) -> Result<Extraction, BatchError> {
        let table = self.source.read()?;
        let path = save(
            &table,
            &self.output_dir,
            &self.output_name,
            None,
            SaveOptions::default(),
        )?;
        Ok(Extraction {
            path,
            records: table.len(),
        })
    }
}

/// [`Step`] adapter for any [`Extractor`]. An extraction without records ends `Empty`.
pub struct ExtractStep<E: Extractor> {
    extractor: E,
}

impl<E: Extractor> ExtractStep<E> {
    pub fn new(extractor: E) -> Self {
        Self { extractor }
    }
}

impl<E: Extractor> Step for ExtractStep<E> {
    fn name(&self) -> &str {
        self.extractor.name()
    }

    fn execute(&self, execution: &mut StepExecution) -> Result<(), BatchError> {
        let extraction = self.extractor.extract()?;
        execution.write_count = extraction.records;
        execution.output_file = Some(extraction.path);
        if extraction.records == 0 {
            execution.status = StepStatus::Empty;
        }
        Ok(())
    }
}
