//! # Literal Parsing
//!
//! Parses literal text into a `Value`. Recognized forms:
//!
//! | Form | Example | Result |
//! |------|---------|--------|
//! | NULL | `NULL`, `null` | `Value::Null` |
//! | Boolean | `true`, `FALSE` | `Value::Bool` |
//! | String | `'John'`, `"x y"` | `Value::Str` |
//! | Integer | `42`, `-7` | `Value::Int` |
//! | Real | `3.25`, `-0.5` | `Value::Real` (`.` required) |
//!
//! Anything else falls back to a bare-word string, which keeps assignment
//! right-hand sides like `column1 = new_value` usable.

use crate::error::{ParseSnafu, Result};
use crate::types::Value;

/// Parses one literal.
pub fn parse_literal(text: &str) -> Result<Value> {
    let s = text.trim();
    if s.is_empty() {
        return ParseSnafu {
            message: "empty literal".to_string(),
        }
        .fail();
    }

    if s.eq_ignore_ascii_case("null") {
        return Ok(Value::Null);
    }
    if s.eq_ignore_ascii_case("true") {
        return Ok(Value::Bool(true));
    }
    if s.eq_ignore_ascii_case("false") {
        return Ok(Value::Bool(false));
    }

    if s.len() >= 2
        && ((s.starts_with('\'') && s.ends_with('\''))
            || (s.starts_with('"') && s.ends_with('"')))
    {
        return Ok(Value::Str(s[1..s.len() - 1].to_string()));
    }

    if let Ok(i) = s.parse::<i64>() {
        return Ok(Value::Int(i));
    }

    if s.contains('.') {
        if let Ok(f) = s.parse::<f64>() {
            return Ok(Value::Real(f));
        }
    }

    Ok(Value::Str(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_null_any_case() {
        assert_eq!(parse_literal("NULL").unwrap(), Value::Null);
        assert_eq!(parse_literal("null").unwrap(), Value::Null);
    }

    #[test]
    fn parses_booleans() {
        assert_eq!(parse_literal("true").unwrap(), Value::Bool(true));
        assert_eq!(parse_literal("FALSE").unwrap(), Value::Bool(false));
    }

    #[test]
    fn parses_quoted_strings() {
        assert_eq!(parse_literal("'John'").unwrap(), Value::Str("John".into()));
        assert_eq!(parse_literal("\"a b\"").unwrap(), Value::Str("a b".into()));
    }

    #[test]
    fn parses_numbers() {
        assert_eq!(parse_literal("42").unwrap(), Value::Int(42));
        assert_eq!(parse_literal("-100").unwrap(), Value::Int(-100));
        assert_eq!(parse_literal("3.25").unwrap(), Value::Real(3.25));
    }

    #[test]
    fn bare_words_fall_back_to_strings() {
        assert_eq!(
            parse_literal("new_value").unwrap(),
            Value::Str("new_value".into())
        );
    }

    #[test]
    fn empty_literal_is_an_error() {
        assert!(parse_literal("   ").is_err());
    }
}
