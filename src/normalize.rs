//! Field normalization.
//!
//! Every function here is total: malformed input never fails, it falls back to a
//! best-effort representation. Only [`normalize_decimal`] reports failure, as
//! `None`, so callers pick their own zero policy.

use std::{str::FromStr, sync::LazyLock};

use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static DATE_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}\s+\d{2}:\d{2}:\d{2}$").unwrap());

static DATE_HOUR_MINUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}\s+\d{2}:\d{2}$").unwrap());

static DATE_ONLY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").unwrap());

/// Collapses whitespace runs to a single space and trims.
pub fn normalize_text(value: &str) -> String {
    WHITESPACE.replace_all(value.trim(), " ").into_owned()
}

/// Pads `DD/MM/YYYY` and `DD/MM/YYYY HH:MM` to `DD/MM/YYYY HH:MM:SS`.
///
/// Any other shape is returned as-is (after [`normalize_text`]); dates are not
/// validated here.
///
/// ```
/// use batimento::normalize::normalize_date;
///
/// assert_eq!(normalize_date("01/02/2024"), "01/02/2024 00:00:00");
/// assert_eq!(normalize_date("01/02/2024 10:30"), "01/02/2024 10:30:00");
/// assert_eq!(normalize_date("2024-02-01"), "2024-02-01");
/// ```
pub fn normalize_date(value: &str) -> String {
    let value = normalize_text(value);
    if value.is_empty() || DATE_TIME.is_match(&value) {
        value
    } else if DATE_HOUR_MINUTE.is_match(&value) {
        format!("{value}:00")
    } else if DATE_ONLY.is_match(&value) {
        format!("{value} 00:00:00")
    } else {
        value
    }
}

/// Keeps the 8 CEP digits, or the text-normalized original when the digit count
/// is anything else.
pub fn normalize_postal_code(value: &str) -> String {
    let digits = digits_only(value);
    if digits.len() == 8 {
        digits
    } else {
        normalize_text(value)
    }
}

/// Removes the `R$` symbol and every space. Separators are left untouched.
pub fn normalize_currency(value: &str) -> String {
    value
        .to_uppercase()
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Maps `true/verdadeiro` and `false/falso` (any case) to `"True"`/`"False"`.
pub fn normalize_boolean(value: &str) -> String {
    let trimmed = value.trim();
    match trimmed.to_lowercase().as_str() {
        "false" | "falso" => "False".to_string(),
        "true" | "verdadeiro" => "True".to_string(),
        _ => trimmed.to_string(),
    }
}

/// Parses a number written with Brazilian or international separators.
///
/// - both `,` and `.` present: `.` groups thousands, `,` is the decimal mark;
/// - only `,`: decimal mark;
/// - several `.` and no `,`: all of them group thousands.
///
/// ```
/// use batimento::normalize::normalize_decimal;
/// use rust_decimal::Decimal;
///
/// assert_eq!(normalize_decimal("1.234,56"), Some(Decimal::new(123456, 2)));
/// assert_eq!(normalize_decimal("R$ 10,00"), Some(Decimal::new(1000, 2)));
/// assert_eq!(normalize_decimal("abc"), None);
/// ```
pub fn normalize_decimal(value: &str) -> Option<Decimal> {
    let trimmed = value.trim();
    if trimmed.is_empty() || matches!(trimmed.to_lowercase().as_str(), "nan" | "none" | "null") {
        return None;
    }

    let mut text: String = trimmed
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{00A0}' && *c != '\u{202F}')
        .collect();

    let has_comma = text.contains(',');
    if has_comma && text.contains('.') {
        text = text.replace('.', "").replace(',', ".");
    } else if has_comma {
        text = text.replace(',', ".");
    } else if text.matches('.').count() > 1 {
        text = text.replace('.', "");
    }

    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    if matches!(cleaned.as_str(), "" | "." | "-" | "-." | ".-" | "--") {
        return None;
    }

    Decimal::from_str(&cleaned).ok()
}

/// Renders `value` with exactly two decimals using `separator` as decimal mark.
pub fn format_decimal(value: Decimal, separator: char) -> String {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    let text = rounded.to_string();
    if separator == '.' {
        text
    } else {
        text.replace('.', &separator.to_string())
    }
}

/// Re-parses a monetary cell and renders it with two decimals; empty when unparseable.
pub fn reformat_currency(value: &str, separator: char) -> String {
    normalize_decimal(value)
        .map(|d| format_decimal(d, separator))
        .unwrap_or_default()
}

/// Keeps ASCII digits only.
pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// CPF (11 digits) or CNPJ (14 digits), once reduced to digits.
pub fn is_valid_document(digits: &str) -> bool {
    (digits.len() == 11 || digits.len() == 14) && digits.chars().all(|c| c.is_ascii_digit())
}

/// Strips Portuguese diacritics, trims and uppercases.
pub fn normalize_ascii_upper(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(strip_accent)
        .collect::<String>()
        .to_uppercase()
}

fn strip_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_collapses_whitespace() {
        assert_eq!(normalize_text("  Rua   das\tFlores \n"), "Rua das Flores");
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn date_padding() {
        assert_eq!(normalize_date("01/02/2024"), "01/02/2024 00:00:00");
        assert_eq!(normalize_date("01/02/2024 10:30"), "01/02/2024 10:30:00");
        assert_eq!(normalize_date("01/02/2024 10:30:15"), "01/02/2024 10:30:15");
        assert_eq!(normalize_date("01/02/2024   10:30"), "01/02/2024 10:30:00");
    }

    #[test]
    fn date_passes_other_formats_through() {
        assert_eq!(normalize_date("2024-02-01"), "2024-02-01");
        assert_eq!(normalize_date("1/2/2024"), "1/2/2024");
        assert_eq!(normalize_date(""), "");
    }

    #[test]
    fn postal_code() {
        assert_eq!(normalize_postal_code("30.130-010"), "30130010");
        assert_eq!(normalize_postal_code(" 3013  001 "), "3013 001");
    }

    #[test]
    fn currency_keeps_separators() {
        assert_eq!(normalize_currency("R$ 1.234,56"), "1.234,56");
        assert_eq!(normalize_currency("r$10,00"), "10,00");
        assert_eq!(normalize_currency(""), "");
    }

    #[test]
    fn boolean_tokens() {
        assert_eq!(normalize_boolean("VERDADEIRO"), "True");
        assert_eq!(normalize_boolean("falso"), "False");
        assert_eq!(normalize_boolean(" true "), "True");
        assert_eq!(normalize_boolean(" Talvez "), "Talvez");
        assert_eq!(normalize_boolean(""), "");
    }

    #[test]
    fn decimal_locale_rules() {
        assert_eq!(normalize_decimal("1.234,56"), Some(Decimal::new(123456, 2)));
        assert_eq!(normalize_decimal("1234,56"), Some(Decimal::new(123456, 2)));
        assert_eq!(normalize_decimal("1234.56"), Some(Decimal::new(123456, 2)));
        assert_eq!(normalize_decimal("R$ 10,00"), Some(Decimal::new(1000, 2)));
        assert_eq!(normalize_decimal("1.234.567"), Some(Decimal::new(1234567, 0)));
        assert_eq!(normalize_decimal("-5,5"), Some(Decimal::new(-55, 1)));
        assert_eq!(normalize_decimal("R$\u{00A0}7,25"), Some(Decimal::new(725, 2)));
    }

    #[test]
    fn decimal_failures_are_none() {
        assert_eq!(normalize_decimal(""), None);
        assert_eq!(normalize_decimal("abc"), None);
        assert_eq!(normalize_decimal("nan"), None);
        assert_eq!(normalize_decimal("-"), None);
        assert_eq!(normalize_decimal("1-2"), None);
    }

    #[test]
    fn decimal_formatting() {
        assert_eq!(format_decimal(Decimal::new(50, 0), ','), "50,00");
        assert_eq!(format_decimal(Decimal::new(123456, 2), ','), "1234,56");
        assert_eq!(format_decimal(Decimal::new(12345, 3), '.'), "12.35");
        assert_eq!(reformat_currency("R$ 1.000,5", ','), "1000,50");
        assert_eq!(reformat_currency("n/d", ','), "");
    }

    #[test]
    fn documents() {
        assert_eq!(digits_only("123.456.789-09"), "12345678909");
        assert!(is_valid_document("12345678909"));
        assert!(is_valid_document("12345678000190"));
        assert!(!is_valid_document("1234"));
    }

    #[test]
    fn ascii_upper() {
        assert_eq!(normalize_ascii_upper(" São João "), "SAO JOAO");
        assert_eq!(normalize_ascii_upper("ação"), "ACAO");
    }
}
