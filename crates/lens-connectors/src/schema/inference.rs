//! Per-value type classification and majority-vote merging.
//!
//! - [`infer_type`] classifies one [`Scalar`] into a [`TypeTag`]
//! - [`infer_type_from_values`] tallies a column and picks the winner
//!
//! Text that reads as a number, boolean, or date is classified as that
//! type; the rules below are applied in order and the first match wins.

use chrono::NaiveDate;

use super::types::{Scalar, TypeTag};

/// Classifies a single value.
///
/// Rules, first match wins:
///
/// 1. null or the empty string → `string`
/// 2. parses fully as a number → `integer` if whole, else `float`
///    (whitespace-only text reads as 0, so it is `integer`)
/// 3. native boolean, or the exact text `"true"` / `"false"` → `boolean`
/// 4. native date, or text with a valid `YYYY-MM-DD` prefix → `date`
/// 5. otherwise → `string`
#[must_use]
pub fn infer_type(value: &Scalar) -> TypeTag {
    match value {
        Scalar::Null => TypeTag::String,
        Scalar::Integer(_) => TypeTag::Integer,
        Scalar::Float(f) => classify_number(*f),
        Scalar::Bool(_) => TypeTag::Boolean,
        Scalar::Date(_) => TypeTag::Date,
        Scalar::Text(s) => infer_type_from_str(s),
    }
}

/// Classifies a column by majority vote over its non-blank values.
///
/// Ties resolve to the tag that appears first in [`TypeTag::ALL`]
/// (integer, float, boolean, date, string). An empty or all-blank input
/// yields `string`.
#[must_use]
pub fn infer_type_from_values<'a, I>(values: I) -> TypeTag
where
    I: IntoIterator<Item = &'a Scalar>,
{
    let mut tally = [0usize; TypeTag::ALL.len()];
    let mut seen = 0usize;

    for value in values {
        if value.is_blank() {
            continue;
        }
        tally[infer_type(value).index()] += 1;
        seen += 1;
    }

    if seen == 0 {
        return TypeTag::String;
    }

    let mut best = TypeTag::String;
    let mut best_count = 0;
    for tag in TypeTag::ALL {
        let count = tally[tag.index()];
        if count > best_count {
            best = tag;
            best_count = count;
        }
    }
    best
}

// ── Internal helpers ───────────────────────────────────────────────

fn infer_type_from_str(value: &str) -> TypeTag {
    if value.is_empty() {
        return TypeTag::String;
    }

    if let Some(n) = parse_number_strict(value) {
        return classify_number(n);
    }

    if value == "true" || value == "false" {
        return TypeTag::Boolean;
    }

    if has_date_prefix(value) {
        return TypeTag::Date;
    }

    TypeTag::String
}

fn classify_number(n: f64) -> TypeTag {
    if n.is_finite() && n.fract() == 0.0 {
        TypeTag::Integer
    } else {
        TypeTag::Float
    }
}

/// Parses text that is entirely a number, surrounding whitespace allowed.
///
/// Accepts decimal and exponent notation, `0x`/`0o`/`0b` integer literals,
/// and `Infinity`. Rejects `NaN`, `inf`, and digit separators. Text that is
/// only whitespace reads as 0.
fn parse_number_strict(value: &str) -> Option<f64> {
    let s = value.trim();
    if s.is_empty() {
        return Some(0.0);
    }

    let (sign, unsigned) = match s.as_bytes()[0] {
        b'-' => (-1.0, &s[1..]),
        b'+' => (1.0, &s[1..]),
        _ => (1.0, s),
    };

    if unsigned == "Infinity" {
        return Some(sign * f64::INFINITY);
    }

    // Radix literals take no sign.
    if unsigned.len() == s.len() {
        if let Some(n) = parse_radix_literal(s) {
            return Some(n);
        }
    }

    let mut has_digit = false;
    let mut prev = 0u8;
    for b in unsigned.bytes() {
        match b {
            b'0'..=b'9' => has_digit = true,
            b'.' | b'e' | b'E' => {}
            b'+' | b'-' if matches!(prev, b'e' | b'E') => {}
            _ => return None,
        }
        prev = b;
    }
    if !has_digit {
        return None;
    }

    unsigned.parse::<f64>().ok().map(|n| sign * n)
}

#[allow(clippy::cast_precision_loss)]
fn parse_radix_literal(s: &str) -> Option<f64> {
    let lower = s.get(..2)?.to_ascii_lowercase();
    let radix = match lower.as_str() {
        "0x" => 16,
        "0o" => 8,
        "0b" => 2,
        _ => return None,
    };
    u64::from_str_radix(&s[2..], radix).ok().map(|n| n as f64)
}

/// `YYYY-MM-DD` at the start of the text, forming a real calendar date.
fn has_date_prefix(value: &str) -> bool {
    let Some(prefix) = value.get(..10) else {
        return false;
    };
    let bytes = prefix.as_bytes();
    let shape_ok = bytes.iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        _ => b.is_ascii_digit(),
    });
    shape_ok && NaiveDate::parse_from_str(prefix, "%Y-%m-%d").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Scalar {
        Scalar::from(s)
    }

    #[test]
    fn test_infer_numbers() {
        assert_eq!(infer_type(&text("42")), TypeTag::Integer);
        assert_eq!(infer_type(&text("-7")), TypeTag::Integer);
        assert_eq!(infer_type(&text(" 12 ")), TypeTag::Integer);
        assert_eq!(infer_type(&text("3.0")), TypeTag::Integer);
        assert_eq!(infer_type(&text("1e3")), TypeTag::Integer);
        assert_eq!(infer_type(&text("0x1F")), TypeTag::Integer);
        assert_eq!(infer_type(&text("3.14")), TypeTag::Float);
        assert_eq!(infer_type(&text(".5")), TypeTag::Float);
        assert_eq!(infer_type(&text("Infinity")), TypeTag::Float);
        assert_eq!(infer_type(&Scalar::Integer(30)), TypeTag::Integer);
        assert_eq!(infer_type(&Scalar::Float(2.5)), TypeTag::Float);
        assert_eq!(infer_type(&Scalar::Float(4.0)), TypeTag::Integer);
    }

    #[test]
    fn test_infer_not_numbers() {
        assert_eq!(infer_type(&text("NaN")), TypeTag::String);
        assert_eq!(infer_type(&text("inf")), TypeTag::String);
        assert_eq!(infer_type(&text("1_000")), TypeTag::String);
        assert_eq!(infer_type(&text("12kg")), TypeTag::String);
        assert_eq!(infer_type(&text("-")), TypeTag::String);
        assert_eq!(infer_type(&text("-0x10")), TypeTag::String);
    }

    #[test]
    fn test_infer_empty_and_null() {
        assert_eq!(infer_type(&Scalar::Null), TypeTag::String);
        assert_eq!(infer_type(&text("")), TypeTag::String);
    }

    #[test]
    fn test_infer_whitespace_only_is_zero() {
        assert_eq!(infer_type(&text("   ")), TypeTag::Integer);
        assert_eq!(infer_type(&text("\t\n")), TypeTag::Integer);
        let values = vec![text(" "), text(" "), text("abc")];
        assert_eq!(infer_type_from_values(&values), TypeTag::Integer);
    }

    #[test]
    fn test_infer_boolean() {
        assert_eq!(infer_type(&text("true")), TypeTag::Boolean);
        assert_eq!(infer_type(&text("false")), TypeTag::Boolean);
        assert_eq!(infer_type(&Scalar::Bool(true)), TypeTag::Boolean);
        assert_eq!(infer_type(&text("TRUE")), TypeTag::String);
        assert_eq!(infer_type(&text("yes")), TypeTag::String);
    }

    #[test]
    fn test_infer_dates() {
        assert_eq!(infer_type(&text("2024-01-15")), TypeTag::Date);
        assert_eq!(infer_type(&text("2024-01-15T10:30:00Z")), TypeTag::Date);
        assert_eq!(infer_type(&text("2024-01-15-extra")), TypeTag::Date);
        assert_eq!(infer_type(&Scalar::Date("2024-01-15".into())), TypeTag::Date);
        assert_eq!(infer_type(&text("15-01-2024")), TypeTag::String);
        assert_eq!(infer_type(&text("2024-13-45")), TypeTag::String);
        assert_eq!(infer_type(&text("2024-1-5")), TypeTag::String);
    }

    #[test]
    fn test_majority_vote() {
        let values = vec![text("1"), text("2"), text("x")];
        assert_eq!(infer_type_from_values(&values), TypeTag::Integer);

        let values = vec![text("1.5"), text("2.5"), text("3")];
        assert_eq!(infer_type_from_values(&values), TypeTag::Float);
    }

    #[test]
    fn test_majority_vote_tie_breaks_on_tag_order() {
        let values = vec![text("a"), text("1")];
        assert_eq!(infer_type_from_values(&values), TypeTag::Integer);

        let values = vec![text("2024-01-01"), text("true")];
        assert_eq!(infer_type_from_values(&values), TypeTag::Boolean);
    }

    #[test]
    fn test_majority_vote_skips_blanks() {
        let values = vec![Scalar::Null, text(""), text("true")];
        assert_eq!(infer_type_from_values(&values), TypeTag::Boolean);
        assert_eq!(infer_type_from_values(&[Scalar::Null]), TypeTag::String);
        assert_eq!(infer_type_from_values(std::iter::empty()), TypeTag::String);
    }
}
