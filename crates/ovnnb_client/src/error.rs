//! Error types for the Northbound client.

use ovnnb_protocol::{OpKind, ProtocolError, RowId};
use std::fmt;
use thiserror::Error;

/// Result type for client operations.
pub type NbResult<T> = Result<T, NbError>;

/// Errors that can occur while building or executing commands.
#[derive(Error, Debug)]
pub enum NbError {
    /// The entity an add would create is already in the cache.
    #[error("{entity} {name} already exists")]
    AlreadyExists {
        /// Kind of entity.
        entity: &'static str,
        /// Name or description of the entity.
        name: String,
    },

    /// The entity a command refers to is not in the cache.
    #[error("{entity} {name} not found")]
    NotFound {
        /// Kind of entity.
        entity: &'static str,
        /// Name or description of the entity.
        name: String,
    },

    /// A caller-supplied argument is unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The server rejected the transaction, or replied short.
    #[error("transaction failed: {0}")]
    TransactionFailed(TransactionFailure),

    /// A cached row lacks a required column or has one of the wrong shape.
    #[error("malformed {table} row {row}: column {column}: {reason}")]
    MalformedRow {
        /// Table of the row.
        table: String,
        /// Row id.
        row: RowId,
        /// Offending column.
        column: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Wire notation error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The client has been closed.
    #[error("client is closed")]
    Closed,
}

impl NbError {
    /// Creates an already-exists error.
    pub fn already_exists(entity: &'static str, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity,
            name: name.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(entity: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            name: name.into(),
        }
    }

    /// Creates an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates a malformed-row error.
    pub fn malformed(
        table: &str,
        row: &RowId,
        column: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedRow {
            table: table.to_string(),
            row: row.clone(),
            column: column.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this is an already-exists error.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, NbError::AlreadyExists { .. })
    }

    /// Returns true if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, NbError::NotFound { .. })
    }

    /// Returns true if the caller may resubmit the same commands.
    ///
    /// Nothing is retried automatically.
    pub fn is_retryable(&self) -> bool {
        match self {
            NbError::Transport { retryable, .. } => *retryable,
            NbError::TransactionFailed(failure) => failure.is_short_reply(),
            _ => false,
        }
    }
}

/// One failed operation within a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFailure {
    /// Position of the result in the reply.
    pub index: usize,
    /// Kind of the operation, if the result lines up with one.
    pub op: Option<OpKind>,
    /// Table of the operation, if the result lines up with one.
    pub table: Option<String>,
    /// Error name reported by the server.
    pub error: String,
    /// Error details reported by the server.
    pub details: Option<String>,
}

impl fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.op, &self.table) {
            (Some(op), Some(table)) => write!(
                f,
                "operation {} ({} on {}): {}",
                self.index,
                op.as_str(),
                table,
                self.error
            )?,
            _ => write!(f, "result {}: {}", self.index, self.error)?,
        }
        if let Some(details) = &self.details {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

/// Why a transaction failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFailure {
    /// Number of operations submitted.
    pub expected: usize,
    /// Number of results received.
    pub received: usize,
    /// Every result that carried an error, in reply order.
    pub failures: Vec<OperationFailure>,
}

impl TransactionFailure {
    /// Returns true if the server sent fewer results than operations.
    pub fn is_short_reply(&self) -> bool {
        self.received < self.expected
    }

    /// Returns the first failing operation, if any result carried an error.
    pub fn first(&self) -> Option<&OperationFailure> {
        self.failures.first()
    }
}

impl fmt::Display for TransactionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.failures.split_first() {
            Some((first, rest)) => {
                write!(f, "{first}")?;
                if !rest.is_empty() {
                    write!(f, " and {} more", rest.len())?;
                }
                if self.is_short_reply() {
                    write!(f, "; ")?;
                } else {
                    return Ok(());
                }
            }
            None if !self.is_short_reply() => return write!(f, "no results reported"),
            None => {}
        }
        write!(
            f,
            "expected {} results, received {}",
            self.expected, self.received
        )
    }
}
