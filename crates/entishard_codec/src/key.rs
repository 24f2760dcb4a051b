//! Table primary keys.

use crate::error::{CodecError, CodecResult};
use crate::nuid::Nuid;
use crate::var::{Var, VarType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of types a table may declare for its primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    /// Boolean key.
    Bool,
    /// 32-bit integer key.
    Int,
    /// 64-bit integer key.
    Long,
    /// String key.
    String,
    /// Entity id key.
    Id,
}

impl KeyType {
    /// Maps a value type onto a key type.
    ///
    /// Returns `None` for float and list, which cannot key a table.
    #[must_use]
    pub const fn from_var_type(var_type: VarType) -> Option<Self> {
        match var_type {
            VarType::Bool => Some(KeyType::Bool),
            VarType::Int => Some(KeyType::Int),
            VarType::Long => Some(KeyType::Long),
            VarType::String => Some(KeyType::String),
            VarType::Id => Some(KeyType::Id),
            VarType::Float | VarType::List => None,
        }
    }

    /// The value type a key of this type converts to.
    #[must_use]
    pub const fn var_type(&self) -> VarType {
        match self {
            KeyType::Bool => VarType::Bool,
            KeyType::Int => VarType::Int,
            KeyType::Long => VarType::Long,
            KeyType::String => VarType::String,
            KeyType::Id => VarType::Id,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.var_type().as_str())
    }
}

/// A table primary key.
///
/// One table implementation serves every key type; the key carries its own
/// tag. Keys of the same variant order naturally. Keys of different variants
/// never share a table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKey {
    /// Boolean key.
    Bool(bool),
    /// 32-bit integer key.
    Int(i32),
    /// 64-bit integer key.
    Long(i64),
    /// String key.
    Str(String),
    /// Entity id key.
    Id(Nuid),
}

impl RowKey {
    /// Returns the key's type.
    #[must_use]
    pub const fn key_type(&self) -> KeyType {
        match self {
            RowKey::Bool(_) => KeyType::Bool,
            RowKey::Int(_) => KeyType::Int,
            RowKey::Long(_) => KeyType::Long,
            RowKey::Str(_) => KeyType::String,
            RowKey::Id(_) => KeyType::Id,
        }
    }

    /// Parses the string form of a key, as stored in a cache hash field.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if `text` is not a valid key of `key_type`.
    pub fn parse(key_type: KeyType, text: &str) -> CodecResult<Self> {
        let invalid = || CodecError::invalid_key(key_type, text);
        Ok(match key_type {
            KeyType::Bool => RowKey::Bool(text.parse().map_err(|_| invalid())?),
            KeyType::Int => RowKey::Int(text.parse().map_err(|_| invalid())?),
            KeyType::Long => RowKey::Long(text.parse().map_err(|_| invalid())?),
            KeyType::String => RowKey::Str(text.to_string()),
            KeyType::Id => RowKey::Id(text.parse().map_err(|_| invalid())?),
        })
    }

    /// Converts a value into a key, if its type can key a table.
    #[must_use]
    pub fn from_var(var: &Var) -> Option<Self> {
        match var {
            Var::Bool(v) => Some(RowKey::Bool(*v)),
            Var::Int(v) => Some(RowKey::Int(*v)),
            Var::Long(v) => Some(RowKey::Long(*v)),
            Var::Str(v) => Some(RowKey::Str(v.clone())),
            Var::Id(v) => Some(RowKey::Id(*v)),
            Var::Float(_) | Var::List(_) => None,
        }
    }
}

/// The string form used as the cache hash field name.
impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Bool(v) => write!(f, "{v}"),
            RowKey::Int(v) => write!(f, "{v}"),
            RowKey::Long(v) => write!(f, "{v}"),
            RowKey::Str(v) => f.write_str(v),
            RowKey::Id(v) => write!(f, "{v}"),
        }
    }
}

impl From<RowKey> for Var {
    fn from(key: RowKey) -> Self {
        match key {
            RowKey::Bool(v) => Var::Bool(v),
            RowKey::Int(v) => Var::Int(v),
            RowKey::Long(v) => Var::Long(v),
            RowKey::Str(v) => Var::Str(v),
            RowKey::Id(v) => Var::Id(v),
        }
    }
}

impl From<bool> for RowKey {
    fn from(v: bool) -> Self {
        RowKey::Bool(v)
    }
}

impl From<i32> for RowKey {
    fn from(v: i32) -> Self {
        RowKey::Int(v)
    }
}

impl From<i64> for RowKey {
    fn from(v: i64) -> Self {
        RowKey::Long(v)
    }
}

impl From<String> for RowKey {
    fn from(v: String) -> Self {
        RowKey::Str(v)
    }
}

impl From<&str> for RowKey {
    fn from(v: &str) -> Self {
        RowKey::Str(v.to_string())
    }
}

impl From<Nuid> for RowKey {
    fn from(v: Nuid) -> Self {
        RowKey::Id(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn float_and_list_cannot_key_tables() {
        assert_eq!(KeyType::from_var_type(VarType::Float), None);
        assert_eq!(KeyType::from_var_type(VarType::List), None);
        assert_eq!(KeyType::from_var_type(VarType::Long), Some(KeyType::Long));
    }

    #[test]
    fn parse_matches_display() {
        let keys = [
            RowKey::Bool(true),
            RowKey::Int(-3),
            RowKey::Long(1 << 40),
            RowKey::Str("gold".into()),
            RowKey::Id(Nuid::new(5, 2)),
        ];
        for key in keys {
            let text = key.to_string();
            assert_eq!(RowKey::parse(key.key_type(), &text).unwrap(), key);
        }
    }

    #[test]
    fn parse_rejects_wrong_type() {
        let err = RowKey::parse(KeyType::Int, "abc").unwrap_err();
        assert!(matches!(err, CodecError::InvalidKey { key_type: KeyType::Int, .. }));
    }

    #[test]
    fn var_conversion() {
        assert_eq!(RowKey::from_var(&Var::Int(1001)), Some(RowKey::Int(1001)));
        assert_eq!(RowKey::from_var(&Var::Float(1.0)), None);
        assert_eq!(Var::from(RowKey::Long(9)), Var::Long(9));
    }

    #[test]
    fn keys_order_within_variant() {
        assert!(RowKey::Int(1) < RowKey::Int(2));
        assert!(RowKey::Str("a".into()) < RowKey::Str("b".into()));
    }

    fn row_key() -> impl Strategy<Value = RowKey> {
        prop_oneof![
            any::<bool>().prop_map(RowKey::Bool),
            any::<i32>().prop_map(RowKey::Int),
            any::<i64>().prop_map(RowKey::Long),
            ".{0,16}".prop_map(RowKey::Str),
            (any::<i64>(), any::<i64>()).prop_map(|(u, o)| RowKey::Id(Nuid::new(u, o))),
        ]
    }

    proptest! {
        #[test]
        fn parse_inverts_display(key in row_key()) {
            let text = key.to_string();
            prop_assert_eq!(RowKey::parse(key.key_type(), &text).unwrap(), key);
        }
    }
}
