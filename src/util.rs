// Utility helpers for parsing and formatting.
//
// This module centralizes the forgiving handling of spreadsheet-exported
// values (month names with or without accents, counts typed as text) so the
// engines can assume clean, typed values.
use num_format::{Locale, ToFormattedString};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

const MONTH_NAMES: [(&str, u32); 13] = [
    ("JANEIRO", 1),
    ("FEVEREIRO", 2),
    ("MARÇO", 3),
    ("MARCO", 3),
    ("ABRIL", 4),
    ("MAIO", 5),
    ("JUNHO", 6),
    ("JULHO", 7),
    ("AGOSTO", 8),
    ("SETEMBRO", 9),
    ("OUTUBRO", 10),
    ("NOVEMBRO", 11),
    ("DEZEMBRO", 12),
];

const MONTH_ABBREVS: [&str; 12] = [
    "Jan", "Fev", "Mar", "Abr", "Mai", "Jun", "Jul", "Ago", "Set", "Out", "Nov", "Dez",
];

// Keys are stored folded, so "MARÇO" and "MARCO" collapse into one entry.
static MONTHS_BY_NAME: Lazy<HashMap<String, u32>> = Lazy::new(|| {
    MONTH_NAMES
        .iter()
        .map(|(name, ordinal)| (fold_name(name), *ordinal))
        .collect()
});

/// Upper-case and strip diacritics: `"março "` -> `"MARCO"`.
pub fn fold_name(s: &str) -> String {
    s.trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_uppercase()
}

/// Resolve a Portuguese month name to its ordinal, ignoring case and accents.
pub fn month_from_name(name: &str) -> Option<u32> {
    MONTHS_BY_NAME.get(&fold_name(name)).copied()
}

/// Three-letter Portuguese abbreviation, or the number itself when out of
/// range.
pub fn month_abbrev(month: u32) -> String {
    match month {
        1..=12 => MONTH_ABBREVS[(month - 1) as usize].to_string(),
        _ => month.to_string(),
    }
}

/// Month typed by a user: ordinal (`3`), abbreviation (`Mar`) or full name.
pub fn month_from_token(token: &str) -> Option<u32> {
    if let Ok(n) = token.trim().parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    let folded = fold_name(token);
    MONTH_ABBREVS
        .iter()
        .position(|a| a.to_uppercase() == folded)
        .map(|i| i as u32 + 1)
        .or_else(|| month_from_name(token))
}

pub fn parse_i32_safe(s: Option<&str>) -> Option<i32> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = s.parse::<i32>() {
        return Some(v);
    }
    // Spreadsheet exports often render whole numbers as `2025.0`.
    let f = s.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f >= i32::MIN as f64 && f <= i32::MAX as f64 {
        Some(f as i32)
    } else {
        None
    }
}

/// Largest count a single cell can contribute.
pub const MAX_COUNT: u64 = 1_000_000_000_000;

/// Coerce a count cell to a non-negative integer.
///
/// - Missing, blank, or non-numeric values become `0`.
/// - Decimal values are truncated (`"3.0"` -> 3).
/// - Negative values clamp to `0`; huge values clamp to [`MAX_COUNT`].
pub fn parse_count_safe(s: Option<&str>) -> u64 {
    let Some(s) = s.map(str::trim).filter(|s| !s.is_empty()) else {
        return 0;
    };
    if let Ok(v) = s.parse::<i64>() {
        return (v.max(0) as u64).min(MAX_COUNT);
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() && f > 0.0 => (f.trunc() as u64).min(MAX_COUNT),
        _ => 0,
    }
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus thousands separators on the integer part.
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_val: i64 = parts.next().unwrap_or("0").parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = parts.next() {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

/// Render a relative change (`0.25` -> `+25%`).
pub fn format_change(change: f64) -> String {
    if change > 0.0 {
        format!("+{:.0}%", change * 100.0)
    } else if change < 0.0 {
        format!("-{:.0}%", change.abs() * 100.0)
    } else {
        "0%".to_string()
    }
}
