//! Line-oriented parser for raw collection files.
//!
//! The notary office sends the same data either as a fixed-width text report
//! (columns aligned under a header line) or as a `;` delimited export. The
//! parser detects the fixed-width layout from the header and falls back to
//! delimited parsing line by line. Malformed lines are dropped, never fatal;
//! [`ParseReport`] keeps the counts.

use std::{fs, path::Path, sync::LazyLock};

use csv::ReaderBuilder;
use log::{debug, info};
use regex::Regex;

use crate::{
    core::table::{Row, Table},
    normalize::{
        normalize_boolean, normalize_currency, normalize_date, normalize_postal_code,
        normalize_text,
    },
    BatchError,
};

static BOOLEAN_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(False|True|FALSO|VERDADEIRO)\b").unwrap());

static DOCUMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{3}\.\d{3}\.\d{3}-\d{2}|\d{2}\.\d{3}\.\d{3}/\d{4}-\d{2})").unwrap()
});

static CURRENCY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"R\$\s*[0-9.,]+\s*").unwrap());

/// Normalization applied to a parsed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Date,
    PostalCode,
    Currency,
    Boolean,
}

impl FieldKind {
    pub fn normalize(&self, value: &str) -> String {
        match self {
            FieldKind::Text => normalize_text(value),
            FieldKind::Date => normalize_date(value),
            FieldKind::PostalCode => normalize_postal_code(value),
            FieldKind::Currency => normalize_currency(value),
            FieldKind::Boolean => normalize_boolean(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_owned(),
            kind,
        }
    }
}

/// Recovers values that a badly aligned report pushed into a free-text column.
///
/// Each target is only filled when it is still empty after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditorMining {
    /// Free-text column scanned for misplaced values.
    pub source: String,
    pub boolean_target: String,
    pub document_target: String,
    pub currency_target: String,
}

impl Default for CreditorMining {
    fn default() -> Self {
        Self {
            source: "Credor".to_string(),
            boolean_target: "Intimado".to_string(),
            document_target: "CpfCnpj".to_string(),
            currency_target: "Custas".to_string(),
        }
    }
}

/// Column contract of a raw collection file.
#[derive(Debug, Clone)]
pub struct RecordLayout {
    fields: Vec<FieldSpec>,
    delimiter: char,
    mining: Option<CreditorMining>,
}

impl RecordLayout {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self {
            fields,
            delimiter: ';',
            mining: None,
        }
    }

    /// The notary collection report: eleven columns, creditor mining enabled.
    pub fn tabelionato() -> Self {
        use FieldKind::*;
        Self::new(vec![
            FieldSpec::new("Protocolo", Text),
            FieldSpec::new("VrTitulo", Text),
            FieldSpec::new("DtAnuencia", Date),
            FieldSpec::new("Devedor", Text),
            FieldSpec::new("Endereco", Text),
            FieldSpec::new("Cidade", Text),
            FieldSpec::new("Cep", PostalCode),
            FieldSpec::new("CpfCnpj", Text),
            FieldSpec::new("Intimado", Boolean),
            FieldSpec::new("Custas", Currency),
            FieldSpec::new("Credor", Text),
        ])
        .creditor_mining(CreditorMining::default())
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn creditor_mining(mut self, mining: CreditorMining) -> Self {
        self.mining = Some(mining);
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn columns(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    fn index_of(&self, column: &str) -> Result<usize, BatchError> {
        self.fields
            .iter()
            .position(|f| f.name == column)
            .ok_or_else(|| BatchError::missing_column("record layout", column))
    }
}

/// Character spans of each column in a fixed-width report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedWidthSpec {
    spans: Vec<(usize, usize)>,
}

impl FixedWidthSpec {
    /// Derives the spans from the header line.
    ///
    /// Every column name must appear, in layout order, and the header must not
    /// contain `delimiter`. Each span runs up to the next column's offset; the
    /// last one ends at the header's length.
    ///
    /// ```
    /// use batimento::item::record::FixedWidthSpec;
    ///
    /// let columns = vec!["A".to_string(), "BB".to_string()];
    /// let spec = FixedWidthSpec::detect("A    BB  ", &columns, ';').unwrap();
    /// assert_eq!(spec.spans(), &[(0, 5), (5, 9)]);
    /// assert!(FixedWidthSpec::detect("A;BB", &columns, ';').is_none());
    /// ```
    pub fn detect(header: &str, columns: &[String], delimiter: char) -> Option<Self> {
        if header.trim().is_empty() || header.contains(delimiter) || columns.is_empty() {
            return None;
        }

        // Search past the previous name: offsets strictly increase.
        let mut offsets = Vec::with_capacity(columns.len());
        let mut from = 0;
        for column in columns {
            let byte_offset = from + header[from..].find(column.as_str())?;
            offsets.push(header[..byte_offset].chars().count());
            from = byte_offset + column.len();
        }

        let header_len = header.chars().count();
        let spans = offsets
            .iter()
            .enumerate()
            .map(|(i, &start)| (start, offsets.get(i + 1).copied().unwrap_or(header_len)))
            .collect();
        Some(Self { spans })
    }

    pub fn spans(&self) -> &[(usize, usize)] {
        &self.spans
    }

    fn end(&self) -> usize {
        self.spans.last().map_or(0, |&(_, end)| end)
    }

    /// Slices `line` by characters, right-padding it with spaces when short.
    pub fn slice(&self, line: &str) -> Vec<String> {
        let mut chars: Vec<char> = line.chars().collect();
        if chars.len() < self.end() {
            chars.resize(self.end(), ' ');
        }
        self.spans
            .iter()
            .map(|&(start, end)| normalize_text(&chars[start..end].iter().collect::<String>()))
            .collect()
    }
}

/// Line counts of one parse.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParseReport {
    pub header: bool,
    pub fixed_width: bool,
    pub blank: usize,
    pub accepted: usize,
    pub dropped: usize,
}

/// Parses raw collection text into a table shaped by a [`RecordLayout`].
pub struct RecordParser {
    layout: RecordLayout,
}

impl RecordParser {
    pub fn new(layout: RecordLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    /// Reads `path` as UTF-8 (invalid sequences dropped, BOM removed) and parses it.
    pub fn parse_file<P: AsRef<Path>>(
        &self,
        name: &str,
        path: P,
    ) -> Result<(Table, ParseReport), BatchError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(BatchError::MissingInput(path.to_path_buf()));
        }
        let bytes = fs::read(path)?;
        let text: String = String::from_utf8_lossy(&bytes)
            .chars()
            .filter(|&c| c != '\u{FFFD}')
            .collect();
        self.parse(name, &text)
    }

    pub fn parse(&self, name: &str, content: &str) -> Result<(Table, ParseReport), BatchError> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        let columns = self.layout.columns();
        let mut report = ParseReport::default();
        let mut table = Table::new(name, columns.clone());

        let mut lines = content.lines().map(|l| l.trim_end_matches('\r')).peekable();
        let header = lines.peek().copied().unwrap_or_default();
        let fixed = FixedWidthSpec::detect(header, &columns, self.layout.delimiter);
        report.fixed_width = fixed.is_some();

        let first_column = columns.first().map(String::as_str).unwrap_or_default();
        if !header.is_empty() && !first_column.is_empty() && header.contains(first_column) {
            report.header = true;
            lines.next();
        }

        for line in lines {
            if line.trim().is_empty() {
                report.blank += 1;
                continue;
            }

            let fields = match &fixed {
                Some(spec) if !line.contains(self.layout.delimiter) => Some(spec.slice(line)),
                _ => self.split_delimited(line),
            };

            match fields {
                Some(fields)
                    if fields.len() == self.layout.arity()
                        && fields.first().is_some_and(|f| !f.is_empty()) =>
                {
                    let row = self.normalize_row(fields);
                    table.push(row)?;
                    report.accepted += 1;
                }
                _ => {
                    debug!("Dropping malformed line in '{}': {:?}", name, line);
                    report.dropped += 1;
                }
            }
        }

        if let Some(mining) = &self.layout.mining {
            table = self.mine_creditor(&table, mining)?;
        }

        info!(
            "Parsed '{}': fixed_width={} accepted={} dropped={} blank={}",
            name, report.fixed_width, report.accepted, report.dropped, report.blank
        );
        Ok((table, report))
    }

    fn split_delimited(&self, line: &str) -> Option<Vec<String>> {
        if !line.contains(self.layout.delimiter) {
            return None;
        }
        let mut delimiter = [0u8; 4];
        let delimiter = self.layout.delimiter.encode_utf8(&mut delimiter);
        if delimiter.len() != 1 {
            return Some(line.split(self.layout.delimiter).map(normalize_text).collect());
        }

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter.as_bytes()[0])
            .has_headers(false)
            .flexible(true)
            .from_reader(line.as_bytes());
        let record = reader.records().next()?.ok()?;
        Some(record.iter().map(normalize_text).collect())
    }

    fn normalize_row(&self, fields: Vec<String>) -> Row {
        fields
            .iter()
            .zip(self.layout.fields())
            .map(|(value, spec)| spec.kind.normalize(value))
            .collect()
    }

    fn mine_creditor(&self, table: &Table, mining: &CreditorMining) -> Result<Table, BatchError> {
        let source = self.layout.index_of(&mining.source)?;
        let boolean = self.layout.index_of(&mining.boolean_target)?;
        let document = self.layout.index_of(&mining.document_target)?;
        let currency = self.layout.index_of(&mining.currency_target)?;

        let mut rows = table.rows().to_vec();
        let mut mined = 0;
        for row in rows.iter_mut() {
            if row[boolean].is_empty() {
                if let Some(found) = take_first(&BOOLEAN_TOKEN, &mut row[source]) {
                    row[boolean] = normalize_boolean(&found);
                    mined += 1;
                }
            }
            if row[document].is_empty() {
                if let Some(found) = take_first(&DOCUMENT, &mut row[source]) {
                    row[document] = normalize_text(&found);
                    mined += 1;
                }
            }
            if row[currency].is_empty() && row[source].contains("R$") {
                if let Some(found) = take_first(&CURRENCY, &mut row[source]) {
                    row[currency] = normalize_currency(&found);
                    mined += 1;
                }
            }
        }

        if mined > 0 {
            debug!("Recovered {} value(s) from column '{}'", mined, mining.source);
        }
        Table::from_rows(table.name(), table.columns().to_vec(), rows)
    }
}

/// Removes the first match of `pattern` from `text` and returns it.
fn take_first(pattern: &Regex, text: &mut String) -> Option<String> {
    let found = pattern.find(text.as_str())?;
    let matched = found.as_str().to_string();
    let range = found.range();
    text.replace_range(range, "");
    *text = text.trim().to_string();
    Some(matched)
}
