//! Errors raised while executing a transaction.

use ovnnb_protocol::{OperationResult, RowId};
use thiserror::Error;

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Why an operation or a commit failed.
///
/// Each variant maps to an OVSDB error string, which is what a client
/// sees in the transaction reply.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    /// The table is not part of the schema.
    #[error("unknown table {0}")]
    UnknownTable(String),

    /// The column is not part of the table.
    #[error("unknown column {column} in table {table}")]
    UnknownColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// An operation is missing something its kind requires.
    #[error("{0}")]
    Syntax(String),

    /// Two inserts declared the same placeholder.
    #[error("duplicate uuid-name {0}")]
    DuplicateUuidName(String),

    /// A placeholder was used before any insert declared it.
    #[error("unknown uuid-name {0}")]
    UnknownUuidName(String),

    /// A unique index would be violated.
    #[error("{table} already has a row with {column} {value}")]
    ConstraintViolation {
        /// Table name.
        table: String,
        /// Indexed column.
        column: String,
        /// Duplicated value.
        value: String,
    },

    /// A strong reference points at a missing row at commit time.
    #[error("{table} column {column} references missing row {target}")]
    ReferentialIntegrity {
        /// Referencing table.
        table: String,
        /// Referencing column.
        column: String,
        /// Missing row.
        target: RowId,
    },

    /// A failure injected by a test.
    #[error("{details}")]
    Injected {
        /// OVSDB error string to report.
        error: String,
        /// Details to report.
        details: String,
    },
}

impl DatabaseError {
    /// Returns the OVSDB error string for this failure.
    pub fn code(&self) -> &str {
        match self {
            DatabaseError::UnknownTable(_) | DatabaseError::Syntax(_) => "syntax error",
            DatabaseError::UnknownColumn { .. } => "unknown column",
            DatabaseError::DuplicateUuidName(_) => "duplicate uuid-name",
            DatabaseError::UnknownUuidName(_) => "syntax error",
            DatabaseError::ConstraintViolation { .. } => "constraint violation",
            DatabaseError::ReferentialIntegrity { .. } => "referential integrity violation",
            DatabaseError::Injected { error, .. } => error,
        }
    }

    /// Converts to the error result placed in a transaction reply.
    pub fn to_result(&self) -> OperationResult {
        OperationResult::error(self.code(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_ovsdb_strings() {
        let err = DatabaseError::ReferentialIntegrity {
            table: "Logical_Switch".into(),
            column: "ports".into(),
            target: RowId::new("p-1"),
        };
        assert_eq!(err.code(), "referential integrity violation");
        assert_eq!(
            err.to_string(),
            "Logical_Switch column ports references missing row p-1"
        );

        let result = DatabaseError::UnknownTable("Nope".into()).to_result();
        assert_eq!(result.error.as_deref(), Some("syntax error"));
        assert_eq!(result.details.as_deref(), Some("unknown table Nope"));
    }

    #[test]
    fn injected_failures_report_their_code() {
        let err = DatabaseError::Injected {
            error: "timed out".into(),
            details: "lock wait".into(),
        };
        assert_eq!(err.code(), "timed out");
        assert_eq!(err.to_result().details.as_deref(), Some("lock wait"));
    }
}
