//! Composite entity identifier.

use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of an entity.
///
/// A `Nuid` is the pair `(unique, origin)`:
/// - `origin` names the shard (node) that owns the entity
/// - `unique` distinguishes entities within that shard
///
/// Two ids are equal iff both parts are equal. The all-zero id is the
/// [`Nuid::EMPTY`] sentinel and means "no entity".
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Nuid {
    /// Sequence number, unique within the owning shard.
    pub unique: i64,
    /// Owning shard.
    pub origin: i64,
}

impl Nuid {
    /// The "no entity" sentinel.
    pub const EMPTY: Nuid = Nuid {
        unique: 0,
        origin: 0,
    };

    /// Creates an id from its two parts.
    #[inline]
    #[must_use]
    pub const fn new(unique: i64, origin: i64) -> Self {
        Self { unique, origin }
    }

    /// Returns true if this is the empty sentinel.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.unique == 0 && self.origin == 0
    }
}

impl fmt::Debug for Nuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nuid({}:{})", self.unique, self.origin)
    }
}

impl fmt::Display for Nuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.unique, self.origin)
    }
}

impl FromStr for Nuid {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CodecError::InvalidNuid {
            text: s.to_string(),
        };
        let (unique, origin) = s.split_once(':').ok_or_else(invalid)?;
        let unique = unique.trim().parse().map_err(|_| invalid())?;
        let origin = origin.trim().parse().map_err(|_| invalid())?;
        Ok(Self { unique, origin })
    }
}

impl From<(i64, i64)> for Nuid {
    fn from((unique, origin): (i64, i64)) -> Self {
        Self::new(unique, origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_needs_both_parts() {
        assert_eq!(Nuid::new(1, 2), Nuid::new(1, 2));
        assert_ne!(Nuid::new(1, 2), Nuid::new(1, 3));
        assert_ne!(Nuid::new(1, 2), Nuid::new(2, 2));
    }

    #[test]
    fn empty_sentinel() {
        assert!(Nuid::EMPTY.is_empty());
        assert!(Nuid::default().is_empty());
        assert!(!Nuid::new(0, 1).is_empty());
    }

    #[test]
    fn display_and_parse() {
        let id = Nuid::new(-42, 7);
        let text = id.to_string();
        assert_eq!(text, "-42:7");
        assert_eq!(text.parse::<Nuid>().unwrap(), id);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<Nuid>().is_err());
        assert!("12".parse::<Nuid>().is_err());
        assert!("a:b".parse::<Nuid>().is_err());
    }

    #[test]
    fn ordering_is_unique_then_origin() {
        assert!(Nuid::new(1, 9) < Nuid::new(2, 0));
        assert!(Nuid::new(1, 1) < Nuid::new(1, 2));
    }
}
