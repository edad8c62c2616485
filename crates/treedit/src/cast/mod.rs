//! Scalar auto-casting for raw leaf text.
//!
//! Leaf values are entered as plain text and re-derived into a typed scalar
//! on every edit: `"null"`, `"true"` and `"false"` (case-insensitive) map to
//! the corresponding JSON scalar, numeric-looking text maps to a number, and
//! everything else stays a string.
//!
//! A value counts as numeric only when two independent parses agree: a
//! strict whole-string parse and a loose prefix parse. This is what keeps
//! `"12abc"` a string while `"  12.5e3 "` becomes a number.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Number, Value};

// ── Auto-cast ─────────────────────────────────────────────────────────────

/// Cast raw text to the most specific JSON scalar it denotes.
///
/// The empty string stays the empty string, so clearing a value never
/// conjures up a `0`.
pub fn cast_text(text: &str) -> Value {
    if text.is_empty() {
        return Value::String(String::new());
    }
    let lower = text.to_lowercase();
    match lower.as_str() {
        "null" => return Value::Null,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    match (number_from_text(text), float_prefix(text)) {
        (Some(n), Some(_)) => number_value(n).unwrap_or_else(|| Value::String(text.to_string())),
        _ => Value::String(text.to_string()),
    }
}

/// True when `text` would auto-cast to something other than a string.
///
/// This is the classifier behind the explicit string tag: numeric, boolean
/// or null-looking text keeps its literal form only when tagged as string.
pub fn casts_to_non_string(text: &str) -> bool {
    !matches!(cast_text(text), Value::String(_))
}

/// The display text of a scalar, as a user would type it back in.
pub fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Branch values carry no scalar text.
        Value::Array(_) | Value::Object(_) => String::new(),
    }
}

// ── Numeric parses ────────────────────────────────────────────────────────

/// Strict whole-string numeric parse.
///
/// Accepts surrounding whitespace, decimal and exponent forms, `0x` hex and
/// the literal spellings `Infinity`/`-Infinity`. Anything with leftover
/// characters is rejected.
fn number_from_text(text: &str) -> Option<f64> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok().map(|v| v as f64);
    }
    match t {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    // Rust's f64 parser also accepts "inf", "infinity" and "NaN"; those are
    // not numeric literals here, so any alphabetic except an exponent marker
    // disqualifies the text before the parse runs.
    if t.chars()
        .any(|c| c.is_ascii_alphabetic() && !matches!(c, 'e' | 'E'))
    {
        return None;
    }
    t.parse::<f64>().ok()
}

/// Loose prefix parse: the leading float literal of the text, if any.
fn float_prefix(text: &str) -> Option<f64> {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    let re = PREFIX.get_or_init(|| {
        Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").expect("float prefix pattern")
    });
    let t = text.trim_start();
    re.find(t).and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Build a JSON number from an `f64`, preferring the integer representation.
///
/// Returns `None` for non-finite values, which JSON cannot represent; the
/// caller falls back to keeping the literal text.
fn number_value(n: f64) -> Option<Value> {
    if !n.is_finite() {
        return None;
    }
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return Some(Value::Number(Number::from(n as i64)));
    }
    Number::from_f64(n).map(Value::Number)
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_stays_empty_string() {
        assert_eq!(cast_text(""), json!(""));
    }

    #[test]
    fn null_and_bools_any_case() {
        assert_eq!(cast_text("null"), json!(null));
        assert_eq!(cast_text("NULL"), json!(null));
        assert_eq!(cast_text("true"), json!(true));
        assert_eq!(cast_text("False"), json!(false));
    }

    #[test]
    fn integers_and_floats() {
        assert_eq!(cast_text("42"), json!(42));
        assert_eq!(cast_text("-7"), json!(-7));
        assert_eq!(cast_text("3.25"), json!(3.25));
        assert_eq!(cast_text("12.5e3"), json!(12500));
    }

    #[test]
    fn whitespace_padded_numbers() {
        assert_eq!(cast_text("  12  "), json!(12));
    }

    #[test]
    fn hex_casts_to_number() {
        assert_eq!(cast_text("0x1A"), json!(26));
    }

    #[test]
    fn partial_numeric_stays_string() {
        assert_eq!(cast_text("12abc"), json!("12abc"));
        assert_eq!(cast_text("1.2.3"), json!("1.2.3"));
    }

    #[test]
    fn plain_text_stays_string() {
        assert_eq!(cast_text("hello"), json!("hello"));
        assert_eq!(cast_text("truely"), json!("truely"));
    }

    #[test]
    fn non_finite_spellings_stay_strings() {
        assert_eq!(cast_text("Infinity"), json!("Infinity"));
        assert_eq!(cast_text("-Infinity"), json!("-Infinity"));
        assert_eq!(cast_text("NaN"), json!("NaN"));
        assert_eq!(cast_text("inf"), json!("inf"));
    }

    #[test]
    fn classifier_matches_cast() {
        assert!(casts_to_non_string("123"));
        assert!(casts_to_non_string("true"));
        assert!(casts_to_non_string("null"));
        assert!(!casts_to_non_string("hello"));
        assert!(!casts_to_non_string(""));
    }

    #[test]
    fn scalar_text_round_trip() {
        assert_eq!(text_of(&json!(null)), "null");
        assert_eq!(text_of(&json!(true)), "true");
        assert_eq!(text_of(&json!(42)), "42");
        assert_eq!(text_of(&json!("abc")), "abc");
    }
}
