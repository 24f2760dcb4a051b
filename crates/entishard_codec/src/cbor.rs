//! Snapshot document format.
//!
//! Shard snapshots are plain serde structures written as CBOR.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a value to CBOR bytes.
///
/// # Errors
///
/// Returns `EncodingFailed` if serialization fails.
pub fn to_cbor<T: Serialize>(value: &T) -> CodecResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(bytes)
}

/// Decodes a value from CBOR bytes.
///
/// # Errors
///
/// Returns `DecodingFailed` if the bytes are not a valid encoding of `T`.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
}
