//! # Column Data Types
//!
//! The canonical `DataType` enum used across schema definitions, constraint
//! validation, and the snapshot codec.
//!
//! ## Design
//!
//! 1. **Single source of truth**: one enum used everywhere
//! 2. **Storage-efficient**: `#[repr(u8)]` for a single-byte discriminant
//!    in the image format
//! 3. **Permissive for NULL**: admissibility checks accept Null for every
//!    type; NOT NULL is a constraint, not a type property
//!
//! | Type | Rust payload |
//! |---------|-----------|
//! | Integer | i64 |
//! | Real | f64 |
//! | String | String |
//! | Boolean | bool |

use crate::error::{DbError, ParseSnafu};
use crate::types::Value;

/// Declared type of a column.
///
/// Uses `#[repr(u8)]` so the discriminant encodes directly into the
/// database image.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Integer = 0,
    Real = 1,
    String = 2,
    Boolean = 3,
}

impl DataType {
    /// Parses a type keyword from a column definition. Case-insensitive.
    pub fn parse(ident: &str) -> Option<DataType> {
        match ident.to_ascii_uppercase().as_str() {
            "INTEGER" => Some(DataType::Integer),
            "REAL" => Some(DataType::Real),
            "STRING" => Some(DataType::String),
            "BOOLEAN" => Some(DataType::Boolean),
            _ => None,
        }
    }

    /// Returns true if `value` may be stored in a column of this type.
    ///
    /// Null is admissible for every type; a non-null value must match the
    /// declared type exactly. Integer is never silently widened to Real
    /// here.
    pub fn admits(&self, value: &Value) -> bool {
        match value.data_type() {
            None => true,
            Some(t) => t == *self,
        }
    }

    /// The keyword form used in column definitions and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Real => "REAL",
            DataType::String => "STRING",
            DataType::Boolean => "BOOLEAN",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for DataType {
    type Error = DbError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DataType::Integer),
            1 => Ok(DataType::Real),
            2 => Ok(DataType::String),
            3 => Ok(DataType::Boolean),
            _ => ParseSnafu {
                message: format!("invalid DataType discriminant: {}", value),
            }
            .fail(),
        }
    }
}
