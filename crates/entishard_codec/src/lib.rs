//! # entishard codec
//!
//! Leaf value types shared by every entishard crate, and the two byte
//! formats they travel in.
//!
//! - [`Nuid`]: composite entity id, `(unique, origin)`. The origin names the
//!   owning shard.
//! - [`Var`] / [`VarType`] / [`NList`]: the seven schema value types
//!   (bool, int, long, float, string, id, list).
//! - [`RowKey`] / [`KeyType`]: the closed set of table primary-key types.
//! - [`json`]: the text format used for values stored in the remote cache.
//!   Values are encoded without type tags and decoded against the schema.
//! - [`cbor`]: the binary format used for shard snapshot documents.
//!
//! ## Usage
//!
//! ```
//! use entishard_codec::{json, NList, Var, VarType};
//!
//! let row = NList::from(vec![Var::Int(1), Var::Long(1_700_000_000)]);
//! let text = json::encode_row(&row).unwrap();
//! assert_eq!(text, "[1,1700000000]");
//!
//! let decoded = json::decode_row(&[VarType::Int, VarType::Long], &text).unwrap();
//! assert_eq!(decoded, row);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod cbor;
mod error;
pub mod json;
mod key;
mod nuid;
mod var;

pub use error::{CodecError, CodecResult};
pub use key::{KeyType, RowKey};
pub use nuid::Nuid;
pub use var::{NList, Var, VarType, VarValue};
