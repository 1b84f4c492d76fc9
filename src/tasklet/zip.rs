//! # CSV-in-ZIP output
//!
//! Every artifact produced by the pipelines is a single delimited file stored in
//! a single ZIP archive, both named after the same stem:
//! `{prefix}_{timestamp}.zip` containing `{prefix}_{timestamp}.csv`.
//!
//! The archive is first written under a temporary name in the target directory
//! and then renamed into place, so a reader never sees a half-written file.
//!
//! ## Examples
//!
//! ```rust
//! use batimento::core::table::Table;
//! use batimento::tasklet::zip::ZipTableWriterBuilder;
//!
//! # fn example() -> Result<(), batimento::BatchError> {
//! let dir = std::env::temp_dir().join("batimento_doc_zip");
//! let table = Table::from_rows("t", vec!["CHAVE".into()], vec![vec!["A".into()]])?;
//!
//! let path = ZipTableWriterBuilder::new()
//!     .target_dir(&dir)
//!     .prefix("baixa_tabelionato")
//!     .timestamp("20240101_120000")
//!     .build()?
//!     .write(&table)?;
//!
//! assert!(path.ends_with("baixa_tabelionato_20240101_120000.zip"));
//! # std::fs::remove_dir_all(&dir).ok();
//! # Ok(())
//! # }
//! ```

use crate::{core::table::Table, item::csv::csv_writer::CsvTableWriterBuilder, BatchError};
use chrono::Local;
use log::{debug, info, warn};
use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

/// Timestamp format used in every generated file name.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Current local time formatted with [`TIMESTAMP_FORMAT`].
pub fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Formatting options shared by every saved table.
#[derive(Debug, Clone, Copy)]
pub struct SaveOptions {
    pub delimiter: u8,
    /// 0 stores entries uncompressed, 1-9 deflates.
    pub compression_level: i32,
    pub bom: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            delimiter: b';',
            compression_level: 6,
            bom: false,
        }
    }
}

/// Writes a [`Table`] as one CSV entry inside one ZIP archive.
#[derive(Debug)]
pub struct ZipTableWriter {
    target_dir: PathBuf,
    stem: String,
    options: SaveOptions,
}

impl ZipTableWriter {
    /// Final path of the archive.
    pub fn target_path(&self) -> PathBuf {
        self.target_dir.join(format!("{}.zip", self.stem))
    }

    /// Writes `table` and returns the archive path.
    pub fn write(&self, table: &Table) -> Result<PathBuf, BatchError> {
        let target = self.target_path();
        let temporary = self.target_dir.join(format!(".{}.zip.tmp", self.stem));
        let entry_name = format!("{}.csv", self.stem);

        debug!(
            "Writing table '{}' ({} rows) to {}",
            table.name(),
            table.len(),
            temporary.display()
        );

        let written = self.write_archive(table, &temporary, &entry_name);
        if let Err(error) = written {
            fs::remove_file(&temporary).ok();
            return Err(error);
        }

        fs::rename(&temporary, &target)?;

        info!(
            "Saved '{}' to {}: rows={}",
            table.name(),
            target.display(),
            table.len()
        );
        Ok(target)
    }

    fn write_archive(
        &self,
        table: &Table,
        path: &Path,
        entry_name: &str,
    ) -> Result<(), BatchError> {
        let content = CsvTableWriterBuilder::new()
            .delimiter(self.options.delimiter)
            .bom(self.options.bom)
            .to_bytes(table)?;

        let file_options = if self.options.compression_level == 0 {
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(self.options.compression_level as i64))
        };

        let mut zip_writer = ZipWriter::new(File::create(path)?);
        zip_writer.start_file(entry_name, file_options)?;
        zip_writer.write_all(&content)?;
        zip_writer.finish()?;
        Ok(())
    }
}

/// Builder for [`ZipTableWriter`].
///
/// Without a timestamp the archive is named `{prefix}.zip`.
#[derive(Debug, Default)]
pub struct ZipTableWriterBuilder {
    target_dir: Option<PathBuf>,
    prefix: Option<String>,
    timestamp: Option<String>,
    options: SaveOptions,
}

impl ZipTableWriterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.target_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// File stem prefix. Required.
    pub fn prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Appended to the prefix as `{prefix}_{timestamp}`.
    pub fn timestamp<S: Into<String>>(mut self, timestamp: S) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn options(mut self, options: SaveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.options.delimiter = delimiter;
        self
    }

    pub fn compression_level(mut self, level: i32) -> Self {
        self.options.compression_level = level.clamp(0, 9);
        self
    }

    /// Validates the configuration and creates the target directory.
    pub fn build(self) -> Result<ZipTableWriter, BatchError> {
        let target_dir = self.target_dir.ok_or_else(|| {
            BatchError::Configuration("zip writer: target directory is required".to_string())
        })?;
        let prefix = self
            .prefix
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| BatchError::Configuration("zip writer: prefix is required".to_string()))?;

        fs::create_dir_all(&target_dir)?;

        let stem = match self.timestamp {
            Some(ts) => format!("{prefix}_{ts}"),
            None => prefix,
        };

        Ok(ZipTableWriter {
            target_dir,
            stem,
            options: self.options,
        })
    }
}

/// Saves `table` as `{dir}/{prefix}[_{timestamp}].zip` and returns the path.
pub fn save<P: AsRef<Path>>(
    table: &Table,
    dir: P,
    prefix: &str,
    timestamp: Option<&str>,
    options: SaveOptions,
) -> Result<PathBuf, BatchError> {
    let mut builder = ZipTableWriterBuilder::new()
        .target_dir(dir)
        .prefix(prefix)
        .options(options);
    if let Some(ts) = timestamp {
        builder = builder.timestamp(ts);
    }
    builder.build()?.write(table)
}

/// Deletes `{dir}/{prefix}_*.zip` files left by previous runs, except `keep`.
///
/// Returns how many files were removed. Files that cannot be removed are
/// logged and skipped.
pub fn remove_previous<P: AsRef<Path>>(
    dir: P,
    prefix: &str,
    keep: Option<&Path>,
) -> Result<usize, BatchError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Ok(0);
    }

    let pattern_start = format!("{prefix}_");
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path.is_file()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&pattern_start) && n.ends_with(".zip"));
        if !matches || keep.is_some_and(|k| k == path.as_path()) {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed previous output {}", path.display());
                removed += 1;
            }
            Err(error) => warn!("Cannot remove {}: {}", path.display(), error),
        }
    }
    Ok(removed)
}

/// Most recently modified `*.zip` directly under `dir`.
pub fn newest_zip<P: AsRef<Path>>(dir: P) -> Result<Option<PathBuf>, BatchError> {
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || !crate::item::csv::csv_reader::is_zip(&path) {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if newest.as_ref().is_none_or(|(time, _)| modified > *time) {
            newest = Some((modified, path));
        }
    }
    Ok(newest.map(|(_, path)| path))
}
