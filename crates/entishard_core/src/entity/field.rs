//! Typed single-value field.

use crate::error::{CoreError, CoreResult};
use crate::event::FieldDelta;
use entishard_codec::{Var, VarType, VarValue};
use serde::{Deserialize, Serialize};

/// A field holding one value of its declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    name: String,
    value: Var,
}

impl Field {
    /// Creates a field holding the null value of `var_type`.
    pub fn new(name: impl Into<String>, var_type: VarType) -> Self {
        Self {
            name: name.into(),
            value: Var::null(var_type),
        }
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    #[must_use]
    pub fn var_type(&self) -> VarType {
        self.value.var_type()
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> &Var {
        &self.value
    }

    /// Current value as `T`, or `None` if `T` is not the declared type.
    #[must_use]
    pub fn get<T: VarValue>(&self) -> Option<T> {
        T::from_var(&self.value)
    }

    /// Replaces the value.
    ///
    /// Returns `Ok(None)` when the new value equals the current one; nothing
    /// changes and no delta is produced.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if `value` is not of the declared type, or
    /// `NonFiniteFloat` if it carries a NaN or infinite float.
    pub fn set(&mut self, value: Var) -> CoreResult<Option<FieldDelta>> {
        check_value(&self.name, self.var_type(), &value)?;
        if value == self.value {
            return Ok(None);
        }
        let old = std::mem::replace(&mut self.value, value);
        Ok(Some(FieldDelta {
            old,
            new: self.value.clone(),
        }))
    }
}

/// Checks that `value` may be stored under `name`.
pub(crate) fn check_value(name: &str, expected: VarType, value: &Var) -> CoreResult<()> {
    if !value.is(expected) {
        return Err(CoreError::type_mismatch(name, expected, value.var_type()));
    }
    // NaN never equals itself, so it would defeat no-op detection.
    if !value.is_finite() {
        return Err(CoreError::NonFiniteFloat {
            name: name.to_string(),
        });
    }
    Ok(())
}
