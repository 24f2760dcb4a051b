//! Error types for entishard core.

use entishard_codec::{KeyType, Nuid, VarType};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
///
/// Errors fall into three groups:
/// - schema mismatches (unknown type, field, table or column)
/// - rejected mutations (absent entity or row, wrong value type)
/// - infrastructure failures (storage, codec, unreachable node)
///
/// The node absorbs the first two at its public boundary and logs them.
/// Infrastructure failures surface only at the persistence boundary; see
/// [`CoreError::is_infrastructure`].
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] entishard_storage::StorageError),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(#[from] entishard_codec::CodecError),

    /// The schema has no prefab for an entity type.
    #[error("unknown entity type: {entity_type}")]
    UnknownEntityType {
        /// The unknown type name.
        entity_type: String,
    },

    /// The schema itself is invalid.
    #[error("invalid schema: {message}")]
    InvalidSchema {
        /// Description of the problem.
        message: String,
    },

    /// No entity with this id exists on its shard.
    #[error("entity not found: {id}")]
    EntityNotFound {
        /// The missing id.
        id: Nuid,
    },

    /// An entity with this id already exists.
    #[error("entity already exists: {id}")]
    EntityExists {
        /// The existing id.
        id: Nuid,
    },

    /// The entity has no field with this name.
    #[error("entity {id} has no field {name}")]
    FieldNotFound {
        /// Entity id.
        id: Nuid,
        /// Field name.
        name: String,
    },

    /// The entity has no table with this name.
    #[error("entity {id} has no table {name}")]
    TableNotFound {
        /// Entity id.
        id: Nuid,
        /// Table name.
        name: String,
    },

    /// The table has no row with this key.
    #[error("table {table} has no row {key}")]
    RowNotFound {
        /// Table name.
        table: String,
        /// String form of the key.
        key: String,
    },

    /// A column index beyond the table's declared columns.
    #[error("table {table} has {columns} columns, no column {col}")]
    ColumnOutOfRange {
        /// Table name.
        table: String,
        /// Requested column.
        col: usize,
        /// Declared column count.
        columns: usize,
    },

    /// A row with the wrong number of columns.
    #[error("table {table} expects {expected} columns, got {found}")]
    RowArity {
        /// Table name.
        table: String,
        /// Declared column count.
        expected: usize,
        /// Supplied column count.
        found: usize,
    },

    /// A value of the wrong type for a field or column.
    #[error("{name} expects {expected}, got {found}")]
    TypeMismatch {
        /// Field name, or `table[col]`.
        name: String,
        /// Declared type.
        expected: VarType,
        /// Supplied type.
        found: VarType,
    },

    /// A NaN or infinite float, which cannot be compared or stored.
    #[error("{name} rejects non-finite float")]
    NonFiniteFloat {
        /// Field name, or `table[col]`.
        name: String,
    },

    /// A key of the wrong type for a table.
    #[error("table {table} is keyed by {expected}, got {found}")]
    KeyTypeMismatch {
        /// Table name.
        table: String,
        /// Declared key type.
        expected: KeyType,
        /// Supplied key type.
        found: KeyType,
    },

    /// The node owning a shard could not be reached.
    #[error("node {origin} unavailable")]
    NodeUnavailable {
        /// The unreachable shard.
        origin: i64,
    },
}

impl CoreError {
    /// Create an unknown entity type error.
    pub fn unknown_type(entity_type: impl Into<String>) -> Self {
        Self::UnknownEntityType {
            entity_type: entity_type.into(),
        }
    }

    /// Create an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    /// Create a field not found error.
    pub fn field_not_found(id: Nuid, name: impl Into<String>) -> Self {
        Self::FieldNotFound {
            id,
            name: name.into(),
        }
    }

    /// Create a table not found error.
    pub fn table_not_found(id: Nuid, name: impl Into<String>) -> Self {
        Self::TableNotFound {
            id,
            name: name.into(),
        }
    }

    /// Create a row not found error.
    pub fn row_not_found(table: impl Into<String>, key: impl ToString) -> Self {
        Self::RowNotFound {
            table: table.into(),
            key: key.to_string(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(name: impl Into<String>, expected: VarType, found: VarType) -> Self {
        Self::TypeMismatch {
            name: name.into(),
            expected,
            found,
        }
    }

    /// Returns true for storage, codec and routing failures.
    ///
    /// These abort a whole load or flush cycle. Everything else is a
    /// rejected operation that leaves state untouched.
    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Codec(_) | Self::NodeUnavailable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_classification() {
        let storage = CoreError::from(entishard_storage::StorageError::TransactionAborted(
            "x".into(),
        ));
        assert!(storage.is_infrastructure());
        assert!(CoreError::NodeUnavailable { origin: 1 }.is_infrastructure());
        assert!(!CoreError::EntityNotFound { id: Nuid::new(1, 1) }.is_infrastructure());
        assert!(!CoreError::row_not_found("t", 3).is_infrastructure());
    }

    #[test]
    fn messages_name_the_subject() {
        let err = CoreError::type_mismatch("level", VarType::Int, VarType::String);
        assert_eq!(err.to_string(), "level expects int, got string");
        let err = CoreError::row_not_found("quest_table", 1001);
        assert_eq!(err.to_string(), "table quest_table has no row 1001");
    }
}
