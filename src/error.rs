//! Error taxonomy for QuillDB.
//!
//! Every failure the engine can surface is one of the variants below; the
//! kernel never panics and never loses the failure class behind a stringly
//! error. Kernel failures abort the current command with no partial effect,
//! and the façade surfaces them verbatim.

use snafu::Snafu;

use crate::database::DatabaseState;
use crate::types::DataType;

/// Unified result type for database operations.
pub type Result<T, E = DbError> = std::result::Result<T, E>;

/// What a `NotFound`/`AlreadyExists` error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Database,
    Table,
    Column,
    Constraint,
    Command,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let word = match self {
            Entity::Database => "database",
            Entity::Table => "table",
            Entity::Column => "column",
            Entity::Constraint => "constraint",
            Entity::Command => "command",
        };
        f.write_str(word)
    }
}

/// Top-level error type for all engine operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DbError {
    /// Null, empty, or malformed identifier.
    #[snafu(display("invalid identifier '{name}'"))]
    InvalidName {
        /// The offending identifier text.
        name: String,
    },

    /// Mutating operation attempted outside CREATED/IN_WORK.
    #[snafu(display("operation not permitted while the database is {state}"))]
    InvalidState {
        /// The database state at the time of the call.
        state: DatabaseState,
    },

    /// A referenced database object does not exist.
    #[snafu(display("{entity} '{name}' not found"))]
    NotFound {
        /// Kind of object looked up.
        entity: Entity,
        /// Name used for the lookup.
        name: String,
    },

    /// Attempt to create an object that already exists.
    #[snafu(display("{entity} '{name}' already exists"))]
    AlreadyExists {
        /// Kind of object being created.
        entity: Entity,
        /// The duplicate name.
        name: String,
    },

    /// Value incompatible with the column's declared type.
    #[snafu(display("value {found} is not admissible for column '{column}' of type {expected}"))]
    TypeMismatch {
        /// Target column.
        column: String,
        /// Declared column type.
        expected: DataType,
        /// Display form of the rejected value.
        found: String,
    },

    /// A named constraint rejected a candidate value.
    #[snafu(display("constraint '{constraint}' violated on column '{column}': {message}"))]
    ConstraintViolation {
        /// Name of the violated constraint.
        constraint: String,
        /// Column the constraint is attached to.
        column: String,
        /// Why the candidate was rejected.
        message: String,
    },

    /// Malformed column definition, assignment, or condition text.
    #[snafu(display("parse error: {message}"))]
    Parse {
        /// Description of the malformed input.
        message: String,
    },

    /// BEGIN while a transaction is already active.
    #[snafu(display("transaction already in progress"))]
    TxAlreadyActive,

    /// COMMIT/ROLLBACK without an active transaction.
    #[snafu(display("no active transaction"))]
    TxNotActive,

    /// Transaction protocol misuse (e.g. queueing a TCL command).
    #[snafu(display("{message}"))]
    TxMisuse {
        /// What was misused.
        message: String,
    },

    /// Snapshot or output file read/write failure.
    #[snafu(display("{message}: {source}"))]
    Io {
        /// The operation that failed.
        message: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl DbError {
    /// Builds the `Io` variant for a corrupt on-disk image.
    pub(crate) fn corrupt_image(path: &std::path::Path, what: &str) -> DbError {
        DbError::Io {
            message: format!("invalid database image {}", path.display()),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, what.to_string()),
        }
    }
}
