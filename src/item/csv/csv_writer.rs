use std::io::Write;

use csv::WriterBuilder;

use crate::{core::table::Table, BatchError};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Serializes a [`Table`] as delimited text, header first.
///
/// # Examples
///
/// ```
/// use batimento::core::table::Table;
/// use batimento::item::csv::csv_writer::CsvTableWriterBuilder;
///
/// let table = Table::from_rows(
///     "baixa",
///     vec!["NUMERO DOC".into(), "VALOR RECEBIDO".into()],
///     vec![vec!["A".into(), "50,00".into()]],
/// )
/// .unwrap();
///
/// let bytes = CsvTableWriterBuilder::new().to_bytes(&table).unwrap();
/// assert_eq!(String::from_utf8(bytes).unwrap(), "NUMERO DOC;VALOR RECEBIDO\nA;50,00\n");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CsvTableWriterBuilder {
    delimiter: u8,
    bom: bool,
}

impl Default for CsvTableWriterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvTableWriterBuilder {
    pub fn new() -> CsvTableWriterBuilder {
        CsvTableWriterBuilder {
            delimiter: b';',
            bom: false,
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> CsvTableWriterBuilder {
        self.delimiter = delimiter;
        self
    }

    /// Prefixes the output with a UTF-8 byte order mark (spreadsheet friendly).
    pub fn bom(mut self, yes: bool) -> CsvTableWriterBuilder {
        self.bom = yes;
        self
    }

    pub fn write_to<W: Write>(&self, table: &Table, mut wtr: W) -> Result<(), BatchError> {
        if self.bom {
            wtr.write_all(UTF8_BOM)?;
        }

        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .from_writer(wtr);

        writer
            .write_record(table.columns())
            .map_err(|e| BatchError::ItemWriter(e.to_string()))?;
        for row in table.rows() {
            writer
                .write_record(row)
                .map_err(|e| BatchError::ItemWriter(e.to_string()))?;
        }

        writer
            .flush()
            .map_err(|e| BatchError::ItemWriter(e.to_string()))
    }

    pub fn to_bytes(&self, table: &Table) -> Result<Vec<u8>, BatchError> {
        let mut buffer = Vec::new();
        self.write_to(table, &mut buffer)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::csv::csv_reader::CsvTableReaderBuilder;

    fn sample() -> Table {
        Table::from_rows(
            "t",
            vec!["NOME".into(), "VALOR".into()],
            vec![
                vec!["Maria; Silva".into(), "10,00".into()],
                vec!["Jose".into(), "".into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn fields_containing_the_delimiter_are_quoted() {
        let bytes = CsvTableWriterBuilder::new().to_bytes(&sample()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "NOME;VALOR\n\"Maria; Silva\";10,00\nJose;\n");
    }

    #[test]
    fn bom_is_written_first_and_stripped_on_read() {
        let bytes = CsvTableWriterBuilder::new()
            .bom(true)
            .to_bytes(&sample())
            .unwrap();
        assert!(bytes.starts_with(UTF8_BOM));

        let table = CsvTableReaderBuilder::new()
            .from_reader("t", bytes.as_slice())
            .unwrap();
        assert_eq!(table.columns(), sample().columns());
        assert_eq!(table.rows(), sample().rows());
    }

    #[test]
    fn header_is_written_for_empty_table() {
        let empty = Table::new("t", vec!["A".into(), "B".into()]);
        let bytes = CsvTableWriterBuilder::new()
            .delimiter(b',')
            .to_bytes(&empty)
            .unwrap();
        assert_eq!(bytes, b"A,B\n");
    }
}
