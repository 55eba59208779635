//! Shared utilities for the warehouse pipeline.
//!
//! String normalization, lenient number parsing and order statistics used by
//! more than one stage.

use once_cell::sync::Lazy;
use regex::Regex;

// =============================================================================
// String Utilities
// =============================================================================

/// Characters removed before parsing a numeric string.
const NUMERIC_FORMAT_CHARS: [char; 7] = ['$', '€', '£', ',', '%', '_', ' '];

/// Common null/missing value markers.
const NULL_MARKERS: [&str; 12] = [
    "", "-", "n/a", "na", "nan", "null", "none", "unknown", "missing", "error", "#n/a", "?",
];

static LIST_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[,;|/]\s*").expect("Invalid regex: list separator"));

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Invalid regex: whitespace run"));

static NON_ALPHANUMERIC_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("Invalid regex: non-alphanumeric run"));

/// Replace accented Latin letters with their ASCII base letter.
pub fn fold_accents(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
            'Á' | 'À' | 'Ä' | 'Â' | 'Ã' => 'A',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'É' | 'È' | 'Ë' | 'Ê' => 'E',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
            'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
            'Ó' | 'Ò' | 'Ö' | 'Ô' | 'Õ' => 'O',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
            'ñ' => 'n',
            'Ñ' => 'N',
            'ç' => 'c',
            'Ç' => 'C',
            other => other,
        })
        .collect()
}

/// Normalize a raw field name: lowercase, accents folded, every run of
/// non-alphanumerics collapsed to `_`.
///
/// ```rust,ignore
/// assert_eq!(normalize_field_name("Salario Anual (USD)"), "salario_anual_usd");
/// assert_eq!(normalize_field_name("País"), "pais");
/// ```
pub fn normalize_field_name(name: &str) -> String {
    let folded = fold_accents(name.trim()).to_lowercase();
    NON_ALPHANUMERIC_RUN
        .replace_all(&folded, "_")
        .trim_matches('_')
        .to_string()
}

/// Normalize a categorical value for lookups: trimmed, lowercase, accents
/// folded and internal whitespace collapsed.
pub fn normalize_token(value: &str) -> String {
    let folded = fold_accents(value.trim()).to_lowercase();
    WHITESPACE_RUN.replace_all(&folded, " ").into_owned()
}

/// Collapse internal whitespace without changing case.
pub fn collapse_whitespace(value: &str) -> String {
    WHITESPACE_RUN.replace_all(value.trim(), " ").into_owned()
}

/// Check if a string is a null/missing value marker.
pub fn is_null_marker(s: &str) -> bool {
    let lower = s.trim().to_ascii_lowercase();
    NULL_MARKERS.iter().any(|&marker| lower == marker)
}

/// Split delimited text (`,`, `;`, `|`, `/`) into trimmed, non-empty items.
pub fn split_list(value: &str) -> Vec<String> {
    LIST_SEPARATOR
        .split(value.trim())
        .map(str::trim)
        .filter(|item| !item.is_empty() && !is_null_marker(item))
        .map(str::to_string)
        .collect()
}

/// Title-case every whitespace-separated word.
pub fn title_case(value: &str) -> String {
    collapse_whitespace(value)
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Clean a string for numeric parsing by removing formatting characters.
pub fn clean_numeric_string(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| !NUMERIC_FORMAT_CHARS.contains(c))
        .collect()
}

/// Try to parse a string as a numeric value (f64).
///
/// Handles currency symbols, percentages, thousands separators and a
/// trailing `k`/`K` multiplier (`"85k"` is 85000).
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let cleaned = clean_numeric_string(s);
    if cleaned.is_empty() {
        return None;
    }
    let (digits, multiplier) = match cleaned.strip_suffix(['k', 'K']) {
        Some(rest) => (rest, 1_000.0),
        None => (cleaned.as_str(), 1.0),
    };
    digits.parse::<f64>().ok().map(|v| v * multiplier)
}

/// Keep a numeric value only if it is finite and strictly positive.
///
/// Missing numerics are `None`, never a zero sentinel.
pub fn positive(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}

// =============================================================================
// Order Statistics
// =============================================================================

/// Quantile of already sorted values using linear interpolation between
/// closest ranks. Returns `None` for an empty slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Sort a copy of the values, ignoring non-finite entries.
pub fn sorted_finite(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Median of the values, or `None` when there are none.
pub fn median(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    quantile_sorted(&sorted_finite(values), 0.5)
}

/// Arithmetic mean, or `None` when there are no values.
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_field_name() {
        assert_eq!(normalize_field_name("País"), "pais");
        assert_eq!(normalize_field_name("Salario_Anual_USD"), "salario_anual_usd");
        assert_eq!(normalize_field_name(" Años de Experiencia "), "anos_de_experiencia");
        assert_eq!(normalize_field_name("Fecha_Publicación"), "fecha_publicacion");
    }

    #[test]
    fn test_null_markers() {
        assert!(is_null_marker("N/A"));
        assert!(is_null_marker("  "));
        assert!(is_null_marker("Unknown"));
        assert!(!is_null_marker("Lima"));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list("Python, JavaScript;Go | Rust/ SQL"),
            vec!["Python", "JavaScript", "Go", "Rust", "SQL"]
        );
        assert_eq!(split_list("Java, n/a,"), vec!["Java"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("machine   learning"), "Machine Learning");
        assert_eq!(title_case("bOGOTÁ"), "Bogotá");
    }

    #[test]
    fn test_parse_numeric_string() {
        assert_eq!(parse_numeric_string("$85,000"), Some(85_000.0));
        assert_eq!(parse_numeric_string("85k"), Some(85_000.0));
        assert_eq!(parse_numeric_string("12.5"), Some(12.5));
        assert_eq!(parse_numeric_string("abc"), None);
        assert_eq!(parse_numeric_string(""), None);
    }

    #[test]
    fn test_positive() {
        assert_eq!(positive(10.0), Some(10.0));
        assert_eq!(positive(0.0), None);
        assert_eq!(positive(-3.0), None);
        assert_eq!(positive(f64::NAN), None);
    }

    #[test]
    fn test_quantile_linear_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&sorted, 0.25), Some(1.75));
        assert_eq!(quantile_sorted(&sorted, 0.5), Some(2.5));
        assert_eq!(quantile_sorted(&sorted, 0.75), Some(3.25));
        assert_eq!(quantile_sorted(&[], 0.5), None);
        assert_eq!(median([5.0, 1.0, 3.0]), Some(3.0));
        assert_eq!(mean([2.0, 4.0]), Some(3.0));
        assert_eq!(mean(std::iter::empty()), None);
    }
}
