use csv::{ReaderBuilder, Trim};
use log::{debug, info};
use std::{
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};
use zip::ZipArchive;

use crate::{
    core::{item::TableSource, table::Table},
    error::BatchError,
};

const UTF8_BOM: &str = "\u{feff}";

/// A table source backed by a CSV file or a ZIP archive holding one.
///
/// Built with [`CsvTableReaderBuilder::from_path`]; nothing is read until
/// [`TableSource::read`] is called.
pub struct CsvTableReader {
    name: String,
    path: PathBuf,
    options: CsvTableReaderBuilder,
}

impl CsvTableReader {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TableSource for CsvTableReader {
    fn name(&self) -> &str {
        &self.name
    }

    /// Reads a raw CSV file, or the first `.csv` entry of a `.zip` archive.
    fn read(&self) -> Result<Table, BatchError> {
        let path = self.path.as_path();
        if !path.is_file() {
            return Err(BatchError::MissingInput(path.to_path_buf()));
        }

        let table = if is_zip(path) {
            let file = File::open(path)?;
            let mut archive = ZipArchive::new(BufReader::new(file))?;
            let entry_name = (0..archive.len())
                .filter_map(|i| archive.name_for_index(i).map(str::to_string))
                .find(|n| n.to_lowercase().ends_with(".csv"))
                .ok_or_else(|| {
                    BatchError::ItemReader(format!("no CSV entry in {}", path.display()))
                })?;

            let mut entry = archive.by_name(&entry_name)?;
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            self.options.from_text(&self.name, &content)?
        } else {
            let file = File::open(path)?;
            self.options.from_reader(&self.name, BufReader::new(file))?
        };

        info!(
            "Loaded '{}' from {}: rows={}",
            self.name,
            path.display(),
            table.len()
        );
        Ok(table)
    }
}

/// Reads a delimited text source into a [`Table`] of text cells.
///
/// All cells are kept as strings; nothing is inferred. A leading UTF-8 BOM is
/// removed.
///
/// # Examples
///
/// ```
/// use batimento::item::csv::csv_reader::CsvTableReaderBuilder;
///
/// let data = "CHAVE;VALOR\n1;10,00\n2;20,00\n";
/// let table = CsvTableReaderBuilder::new()
///     .delimiter(b';')
///     .from_reader("max", data.as_bytes())
///     .unwrap();
///
/// assert_eq!(table.columns(), &["CHAVE", "VALOR"]);
/// assert_eq!(table.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct CsvTableReaderBuilder {
    /// The delimiter character (default: semicolon ';')
    delimiter: u8,
    /// Whether surrounding whitespace is trimmed from every field (default: false)
    trim: bool,
}

impl Default for CsvTableReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvTableReaderBuilder {
    pub fn new() -> Self {
        Self {
            delimiter: b';',
            trim: false,
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn trim(mut self, yes: bool) -> Self {
        self.trim = yes;
        self
    }

    /// Reads every record of `rdr`; the first record is the header.
    pub fn from_reader<R: Read>(&self, name: &str, mut rdr: R) -> Result<Table, BatchError> {
        let mut content = String::new();
        rdr.read_to_string(&mut content)?;
        self.from_text(name, &content)
    }

    /// Creates a lazy reader over `path` (`.zip` or raw CSV).
    pub fn from_path<P: AsRef<Path>>(self, name: &str, path: P) -> CsvTableReader {
        CsvTableReader {
            name: name.to_owned(),
            path: path.as_ref().to_path_buf(),
            options: self,
        }
    }

    fn from_text(&self, name: &str, content: &str) -> Result<Table, BatchError> {
        let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);

        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .trim(if self.trim { Trim::All } else { Trim::None })
            .from_reader(content.as_bytes());

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| BatchError::ItemReader(format!("{name}: {e}")))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut table = Table::new(name, columns);
        for record in reader.records() {
            let record = record.map_err(|e| BatchError::ItemReader(format!("{name}: {e}")))?;
            table.push(record.iter().map(str::to_string).collect())?;
        }

        debug!("Parsed {} record(s) into table '{}'", table.len(), name);
        Ok(table)
    }
}

/// Loads `path` with the default options (`;` delimiter, untrimmed cells).
pub fn load<P: AsRef<Path>>(name: &str, path: P) -> Result<Table, BatchError> {
    CsvTableReaderBuilder::new().from_path(name, path).read()
}

pub(crate) fn is_zip(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
}
