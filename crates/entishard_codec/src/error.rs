//! Error types for the codec crate.

use crate::key::KeyType;
use crate::var::VarType;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Failed to encode a value.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode bytes or text.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },

    /// A value did not have the type the schema declares.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Type declared by the schema.
        expected: VarType,
        /// Description of what was found instead.
        found: String,
    },

    /// A primary key string could not be parsed as the declared key type.
    #[error("invalid {key_type} key: {text:?}")]
    InvalidKey {
        /// Declared key type.
        key_type: KeyType,
        /// The offending text.
        text: String,
    },

    /// A row did not have the declared number of columns.
    #[error("row has {found} columns, expected {expected}")]
    RowArity {
        /// Declared column count.
        expected: usize,
        /// Actual column count.
        found: usize,
    },

    /// A type name is not one of the known value types.
    #[error("unknown type name: {name}")]
    UnknownType {
        /// The unrecognized name.
        name: String,
    },

    /// Text could not be parsed as an entity id.
    #[error("invalid entity id: {text:?}")]
    InvalidNuid {
        /// The offending text.
        text: String,
    },
}

impl CodecError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(expected: VarType, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected,
            found: found.into(),
        }
    }

    /// Create an invalid key error.
    pub fn invalid_key(key_type: KeyType, text: impl Into<String>) -> Self {
        Self::InvalidKey {
            key_type,
            text: text.into(),
        }
    }

    /// Create an unknown type error.
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::UnknownType { name: name.into() }
    }
}
