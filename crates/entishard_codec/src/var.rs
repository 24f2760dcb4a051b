//! Dynamic schema values.

use crate::error::CodecError;
use crate::nuid::Nuid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The seven value types a field or table column can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarType {
    /// Boolean.
    Bool,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// 32-bit float.
    Float,
    /// UTF-8 string.
    String,
    /// Entity id.
    Id,
    /// Heterogeneous list of values.
    List,
}

impl VarType {
    /// All value types, in declaration order.
    pub const ALL: [VarType; 7] = [
        VarType::Bool,
        VarType::Int,
        VarType::Long,
        VarType::Float,
        VarType::String,
        VarType::Id,
        VarType::List,
    ];

    /// Returns the schema name of this type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            VarType::Bool => "bool",
            VarType::Int => "int",
            VarType::Long => "long",
            VarType::Float => "float",
            VarType::String => "string",
            VarType::Id => "id",
            VarType::List => "list",
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VarType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VarType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CodecError::unknown_type(s))
    }
}

/// A single typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Var {
    /// Boolean value.
    Bool(bool),
    /// 32-bit integer value.
    Int(i32),
    /// 64-bit integer value.
    Long(i64),
    /// Float value.
    Float(f32),
    /// String value.
    Str(String),
    /// Entity id value.
    Id(Nuid),
    /// List value.
    List(NList),
}

impl Var {
    /// Returns the null (default) value of a type.
    #[must_use]
    pub fn null(var_type: VarType) -> Self {
        match var_type {
            VarType::Bool => Var::Bool(false),
            VarType::Int => Var::Int(0),
            VarType::Long => Var::Long(0),
            VarType::Float => Var::Float(0.0),
            VarType::String => Var::Str(String::new()),
            VarType::Id => Var::Id(Nuid::EMPTY),
            VarType::List => Var::List(NList::new()),
        }
    }

    /// Returns the type of this value.
    #[must_use]
    pub const fn var_type(&self) -> VarType {
        match self {
            Var::Bool(_) => VarType::Bool,
            Var::Int(_) => VarType::Int,
            Var::Long(_) => VarType::Long,
            Var::Float(_) => VarType::Float,
            Var::Str(_) => VarType::String,
            Var::Id(_) => VarType::Id,
            Var::List(_) => VarType::List,
        }
    }

    /// Returns true if this value has the given type.
    #[inline]
    #[must_use]
    pub fn is(&self, var_type: VarType) -> bool {
        self.var_type() == var_type
    }

    /// Returns false if the value is or contains a NaN or infinite float.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        match self {
            Var::Float(v) => v.is_finite(),
            Var::List(list) => list.iter().all(Var::is_finite),
            _ => true,
        }
    }

    /// Extracts a typed value, or `None` on type mismatch.
    #[must_use]
    pub fn get<T: VarValue>(&self) -> Option<T> {
        T::from_var(self)
    }

    /// Returns the integer value widened to `i64` for int and long values.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Var::Int(v) => Some(i64::from(*v)),
            Var::Long(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Var::Bool(v) => write!(f, "{v}"),
            Var::Int(v) => write!(f, "{v}"),
            Var::Long(v) => write!(f, "{v}"),
            Var::Float(v) => write!(f, "{v}"),
            Var::Str(v) => write!(f, "{v:?}"),
            Var::Id(v) => write!(f, "{v}"),
            Var::List(v) => write!(f, "{v}"),
        }
    }
}

/// An ordered heterogeneous sequence of values.
///
/// Used for table rows, constructor arguments and command payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NList(Vec<Var>);

impl NList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a value.
    pub fn push(&mut self, value: impl Into<Var>) {
        self.0.push(value.into());
    }

    /// Appends a value, builder style.
    #[must_use]
    pub fn with(mut self, value: impl Into<Var>) -> Self {
        self.push(value);
        self
    }

    /// Returns the value at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Var> {
        self.0.get(index)
    }

    /// Returns a mutable reference to the value at `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Var> {
        self.0.get_mut(index)
    }

    /// Extracts a typed value at `index`.
    #[must_use]
    pub fn get_as<T: VarValue>(&self, index: usize) -> Option<T> {
        self.0.get(index).and_then(T::from_var)
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the values.
    pub fn iter(&self) -> std::slice::Iter<'_, Var> {
        self.0.iter()
    }

    /// Returns the values as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Var] {
        &self.0
    }

    /// Consumes the list, returning its values.
    #[must_use]
    pub fn into_vec(self) -> Vec<Var> {
        self.0
    }
}

impl fmt::Display for NList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str("]")
    }
}

impl From<Vec<Var>> for NList {
    fn from(values: Vec<Var>) -> Self {
        Self(values)
    }
}

impl<V: Into<Var>> FromIterator<V> for NList {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl IntoIterator for NList {
    type Item = Var;
    type IntoIter = std::vec::IntoIter<Var>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a NList {
    type Item = &'a Var;
    type IntoIter = std::slice::Iter<'a, Var>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Rust types that map one-to-one onto a [`VarType`].
///
/// This is what makes typed field and column accessors generic over the
/// seven value types.
pub trait VarValue: Sized + Into<Var> {
    /// The corresponding schema type.
    const VAR_TYPE: VarType;

    /// Extracts `Self` from a value of the matching type.
    fn from_var(var: &Var) -> Option<Self>;

    /// The null value of this type.
    fn null() -> Self;
}

macro_rules! impl_var_value {
    ($ty:ty, $variant:ident, $var_type:ident, $null:expr) => {
        impl From<$ty> for Var {
            fn from(value: $ty) -> Self {
                Var::$variant(value)
            }
        }

        impl VarValue for $ty {
            const VAR_TYPE: VarType = VarType::$var_type;

            fn from_var(var: &Var) -> Option<Self> {
                match var {
                    Var::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }

            fn null() -> Self {
                $null
            }
        }
    };
}

impl_var_value!(bool, Bool, Bool, false);
impl_var_value!(i32, Int, Int, 0);
impl_var_value!(i64, Long, Long, 0);
impl_var_value!(f32, Float, Float, 0.0);
impl_var_value!(String, Str, String, String::new());
impl_var_value!(Nuid, Id, Id, Nuid::EMPTY);
impl_var_value!(NList, List, List, NList::new());

impl From<&str> for Var {
    fn from(value: &str) -> Self {
        Var::Str(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_values_match_type() {
        for t in VarType::ALL {
            assert_eq!(Var::null(t).var_type(), t);
        }
    }

    #[test]
    fn type_names_roundtrip() {
        for t in VarType::ALL {
            assert_eq!(t.as_str().parse::<VarType>().unwrap(), t);
        }
        assert!("double".parse::<VarType>().is_err());
    }

    #[test]
    fn typed_extraction() {
        let v = Var::from(7i32);
        assert_eq!(v.get::<i32>(), Some(7));
        assert_eq!(v.get::<i64>(), None);
        assert_eq!(v.as_i64(), Some(7));
    }

    #[test]
    fn nlist_builder_and_access() {
        let list = NList::new().with(20001).with(1).with("sword");
        assert_eq!(list.len(), 3);
        assert_eq!(list.get_as::<i32>(0), Some(20001));
        assert_eq!(list.get_as::<String>(2), Some("sword".to_string()));
        assert_eq!(list.get_as::<i32>(5), None);
        assert_eq!(list.to_string(), "[20001, 1, \"sword\"]");
    }

    #[test]
    fn nlist_collects_from_iterator() {
        let list: NList = [1i64, 2, 3].into_iter().collect();
        assert_eq!(list.as_slice(), &[Var::Long(1), Var::Long(2), Var::Long(3)]);
    }
}
