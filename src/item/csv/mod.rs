/// Delimited text support for reading and writing [`Table`](crate::core::table::Table)s.
///
/// 1. **CsvTableReader**: reads a raw CSV file, or the first CSV entry of a ZIP
///    archive, keeping every cell as text.
/// 2. **CsvTableWriterBuilder**: serializes a table with a configurable delimiter
///    and an optional byte order mark.
///
/// Both components follow the builder pattern. Sources default to the `;`
/// delimiter used by every input of the pipelines.
///
/// # Examples
///
/// ```
/// use batimento::item::csv::csv_reader::CsvTableReaderBuilder;
/// use batimento::item::csv::csv_writer::CsvTableWriterBuilder;
///
/// let table = CsvTableReaderBuilder::new()
///     .from_reader("fonte", "CHAVE;VALOR\nA;1,00\n".as_bytes())
///     .unwrap();
///
/// let bytes = CsvTableWriterBuilder::new().delimiter(b',').to_bytes(&table).unwrap();
/// assert_eq!(bytes, b"CHAVE,VALOR\nA,\"1,00\"\n");
/// ```
pub mod csv_reader;

pub mod csv_writer;
