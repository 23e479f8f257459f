//! Error types for Lumen store operations.

use crate::row::RowId;
use crate::types::DataType;
use alloc::string::String;
use core::fmt;

/// Result type alias for store operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for store operations.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// A value does not match its column type.
    TypeMismatch {
        column: String,
        expected: DataType,
        got: DataType,
    },
    /// Null written to a non-nullable column.
    NullConstraint {
        column: String,
    },
    /// Row has the wrong number of values for its kind.
    ArityMismatch {
        table: String,
        expected: usize,
        got: usize,
    },
    /// An identity is already taken.
    DuplicateId {
        table: String,
        id: RowId,
    },
    /// No entity with this identity.
    NotFound {
        table: String,
        id: RowId,
    },
    /// Invalid schema definition.
    InvalidSchema {
        message: String,
    },
    /// Entity kind not registered.
    TableNotFound {
        name: String,
    },
    /// Invalid operation.
    InvalidOperation {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TypeMismatch {
                column,
                expected,
                got,
            } => write!(
                f,
                "Type mismatch on column {}: expected {:?}, got {:?}",
                column, expected, got
            ),
            Error::NullConstraint { column } => {
                write!(f, "Null constraint violation on column: {}", column)
            }
            Error::ArityMismatch {
                table,
                expected,
                got,
            } => write!(
                f,
                "Row for {} has {} values, expected {}",
                table, got, expected
            ),
            Error::DuplicateId { table, id } => {
                write!(f, "Identity {} already exists in {}", id, table)
            }
            Error::NotFound { table, id } => {
                write!(f, "Not found in {}: {}", table, id)
            }
            Error::InvalidSchema { message } => write!(f, "Invalid schema: {}", message),
            Error::TableNotFound { name } => write!(f, "Table not found: {}", name),
            Error::InvalidOperation { message } => write!(f, "Invalid operation: {}", message),
        }
    }
}

impl Error {
    pub fn type_mismatch(column: impl Into<String>, expected: DataType, got: DataType) -> Self {
        Error::TypeMismatch {
            column: column.into(),
            expected,
            got,
        }
    }

    pub fn null_constraint(column: impl Into<String>) -> Self {
        Error::NullConstraint {
            column: column.into(),
        }
    }

    pub fn arity_mismatch(table: impl Into<String>, expected: usize, got: usize) -> Self {
        Error::ArityMismatch {
            table: table.into(),
            expected,
            got,
        }
    }

    pub fn duplicate_id(table: impl Into<String>, id: RowId) -> Self {
        Error::DuplicateId {
            table: table.into(),
            id,
        }
    }

    pub fn not_found(table: impl Into<String>, id: RowId) -> Self {
        Error::NotFound {
            table: table.into(),
            id,
        }
    }

    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    pub fn table_not_found(name: impl Into<String>) -> Self {
        Error::TableNotFound { name: name.into() }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }
}
