//! Textual input parsing: identifiers, literals, column definitions, and
//! update assignments.

mod column_def;
mod literal;

pub use column_def::{
    parse_column_def, parse_drop_spec, parse_modify_spec, ColumnSpec, DropTarget, ModifySpec,
};
pub use literal::parse_literal;

use crate::error::{InvalidNameSnafu, ParseSnafu, Result};
use crate::schema::Assignment;

/// Validates an identifier: leading letter or underscore, then letters,
/// digits, or underscores.
pub fn identifier(text: &str) -> Result<String> {
    let t = text.trim();
    let mut chars = t.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if !valid {
        return InvalidNameSnafu { name: t }.fail();
    }
    Ok(t.to_string())
}

/// Parses an UPDATE assignment of the form `column = literal`.
pub fn parse_assignment(text: &str) -> Result<Assignment> {
    let Some((lhs, rhs)) = text.split_once('=') else {
        return ParseSnafu {
            message: format!("invalid assignment '{}': expected 'column = literal'", text),
        }
        .fail();
    };
    Ok(Assignment {
        column: identifier(lhs)?,
        value: parse_literal(rhs)?,
    })
}
