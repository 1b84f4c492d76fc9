use std::collections::HashSet;

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    core::table::Table,
    normalize::{digits_only, normalize_ascii_upper},
    BatchError,
};

/// How a key cell is normalized before comparison.
///
/// The same normalization must be applied on both sides of a comparison; mixing
/// kinds silently yields wrong differences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyNormalization {
    /// Surrounding whitespace removed, case preserved.
    #[default]
    Trimmed,
    /// Digits only, for CPF/CNPJ and other document numbers.
    Digits,
    /// Accents stripped, trimmed and uppercased.
    UpperAscii,
}

impl KeyNormalization {
    /// Normalized form of one key cell.
    pub fn apply(&self, value: &str) -> String {
        match self {
            KeyNormalization::Trimmed => value.trim().to_string(),
            KeyNormalization::Digits => digits_only(value),
            KeyNormalization::UpperAscii => normalize_ascii_upper(value),
        }
    }
}

/// Normalized key values of `column`.
///
/// Blank keys are kept: a blank left key matches a blank right key, so the
/// result of [`difference_by`] never shares a key with `right`.
pub fn key_set(
    table: &Table,
    column: &str,
    normalization: KeyNormalization,
) -> Result<HashSet<String>, BatchError> {
    let idx = table.require_column(column)?;
    Ok(table
        .column_values(idx)
        .map(|v| normalization.apply(v))
        .collect())
}

/// Rows of `left` whose trimmed `left_key` has no counterpart in `right_key` of `right`.
///
/// The operation is directional: `difference(a, .., b, ..)` answers "what is in
/// `a` only", never the symmetric difference.
///
/// # Errors
///
/// [`BatchError::MissingColumn`] when either key column is absent.
///
/// # Examples
///
/// ```
/// use batimento::core::table::Table;
/// use batimento::recon::anti_join::difference;
///
/// let max = Table::from_rows("max", vec!["CHAVE".into()], vec![vec!["1".into()], vec!["2".into()]]).unwrap();
/// let fonte = Table::from_rows("fonte", vec!["CHAVE".into()], vec![vec![" 2 ".into()]]).unwrap();
///
/// let only_max = difference(&max, "CHAVE", &fonte, "CHAVE").unwrap();
/// assert_eq!(only_max.rows(), &[vec!["1".to_string()]]);
/// ```
pub fn difference(
    left: &Table,
    left_key: &str,
    right: &Table,
    right_key: &str,
) -> Result<Table, BatchError> {
    difference_by(left, left_key, right, right_key, KeyNormalization::Trimmed)
}

/// Like [`difference`], with an explicit key normalization applied to both sides.
pub fn difference_by(
    left: &Table,
    left_key: &str,
    right: &Table,
    right_key: &str,
    normalization: KeyNormalization,
) -> Result<Table, BatchError> {
    let left_idx = left.require_column(left_key)?;
    let right_keys = key_set(right, right_key, normalization)?;

    let result = left.filter(|row| !right_keys.contains(&normalization.apply(&row[left_idx])));

    info!(
        "Difference {} - {}: left_rows={} right_keys={} only_left={}",
        left.name(),
        right.name(),
        left.len(),
        right_keys.len(),
        result.len()
    );

    Ok(result)
}
