//! Cache value format.
//!
//! Values written to the remote cache are JSON text without type tags: a
//! field holding `Var::Int(5)` is stored as `5`, a row `[Int(1), Str("a")]`
//! as `[1,"a"]`. Decoding therefore needs the schema's declared types.
//!
//! Ids are stored as `{"unique":..,"origin":..}`. List values nest arbitrary
//! types, so they keep serde's tagged form.

use crate::error::{CodecError, CodecResult};
use crate::nuid::Nuid;
use crate::var::{NList, Var, VarType};
use serde_json::Value as Json;

/// Converts a value into its untagged JSON form.
///
/// # Errors
///
/// Returns `EncodingFailed` for non-finite floats, which JSON cannot carry.
pub fn to_json(var: &Var) -> CodecResult<Json> {
    Ok(match var {
        Var::Bool(v) => Json::Bool(*v),
        Var::Int(v) => Json::from(*v),
        Var::Long(v) => Json::from(*v),
        Var::Float(v) => serde_json::Number::from_f64(f64::from(*v))
            .map(Json::Number)
            .ok_or_else(|| CodecError::encoding_failed(format!("non-finite float {v}")))?,
        Var::Str(v) => Json::String(v.clone()),
        Var::Id(v) => serde_json::to_value(v).map_err(|e| CodecError::encoding_failed(e.to_string()))?,
        Var::List(v) => serde_json::to_value(v).map_err(|e| CodecError::encoding_failed(e.to_string()))?,
    })
}

/// Converts untagged JSON back into a value of the declared type.
///
/// # Errors
///
/// Returns `TypeMismatch` if the JSON does not fit `var_type`.
pub fn from_json(var_type: VarType, json: Json) -> CodecResult<Var> {
    let mismatch = |json: &Json| CodecError::type_mismatch(var_type, json.to_string());
    Ok(match var_type {
        VarType::Bool => Var::Bool(json.as_bool().ok_or_else(|| mismatch(&json))?),
        VarType::Int => {
            let v = json.as_i64().ok_or_else(|| mismatch(&json))?;
            Var::Int(i32::try_from(v).map_err(|_| mismatch(&json))?)
        }
        VarType::Long => Var::Long(json.as_i64().ok_or_else(|| mismatch(&json))?),
        #[allow(clippy::cast_possible_truncation)]
        VarType::Float => Var::Float(json.as_f64().ok_or_else(|| mismatch(&json))? as f32),
        VarType::String => match json {
            Json::String(s) => Var::Str(s),
            other => return Err(mismatch(&other)),
        },
        VarType::Id => {
            let err = mismatch(&json);
            Var::Id(serde_json::from_value::<Nuid>(json).map_err(|_| err)?)
        }
        VarType::List => {
            let err = mismatch(&json);
            Var::List(serde_json::from_value::<NList>(json).map_err(|_| err)?)
        }
    })
}

/// Encodes a single value as cache text.
///
/// # Errors
///
/// See [`to_json`].
pub fn encode_var(var: &Var) -> CodecResult<String> {
    Ok(to_json(var)?.to_string())
}

/// Decodes cache text as a value of the declared type.
///
/// # Errors
///
/// Returns `DecodingFailed` for malformed JSON and `TypeMismatch` if the
/// text does not fit `var_type`.
pub fn decode_var(var_type: VarType, text: &str) -> CodecResult<Var> {
    let json: Json =
        serde_json::from_str(text).map_err(|e| CodecError::decoding_failed(e.to_string()))?;
    from_json(var_type, json)
}

/// Encodes a table row as a JSON array.
///
/// # Errors
///
/// See [`to_json`].
pub fn encode_row(row: &NList) -> CodecResult<String> {
    let values = row.iter().map(to_json).collect::<CodecResult<Vec<_>>>()?;
    Ok(Json::Array(values).to_string())
}

/// Decodes a JSON array as a row with the given column types.
///
/// # Errors
///
/// Returns `RowArity` if the column count differs, and the errors of
/// [`decode_var`] otherwise.
pub fn decode_row(columns: &[VarType], text: &str) -> CodecResult<NList> {
    let json: Json =
        serde_json::from_str(text).map_err(|e| CodecError::decoding_failed(e.to_string()))?;
    let Json::Array(values) = json else {
        return Err(CodecError::decoding_failed(format!("row is not an array: {text}")));
    };
    if values.len() != columns.len() {
        return Err(CodecError::RowArity {
            expected: columns.len(),
            found: values.len(),
        });
    }
    columns
        .iter()
        .zip(values)
        .map(|(ty, value)| from_json(*ty, value))
        .collect::<CodecResult<Vec<_>>>()
        .map(NList::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn scalars_are_untagged() {
        assert_eq!(encode_var(&Var::Int(5)).unwrap(), "5");
        assert_eq!(encode_var(&Var::Bool(true)).unwrap(), "true");
        assert_eq!(encode_var(&Var::Str("hi".into())).unwrap(), "\"hi\"");
        assert_eq!(
            encode_var(&Var::Id(Nuid::new(3, 1))).unwrap(),
            r#"{"unique":3,"origin":1}"#
        );
    }

    #[test]
    fn decode_uses_declared_type() {
        assert_eq!(decode_var(VarType::Long, "5").unwrap(), Var::Long(5));
        assert_eq!(decode_var(VarType::Int, "5").unwrap(), Var::Int(5));
        assert_eq!(decode_var(VarType::Float, "1.5").unwrap(), Var::Float(1.5));
    }

    #[test]
    fn decode_rejects_out_of_range_int() {
        let err = decode_var(VarType::Int, "4294967296").unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { .. }));
    }

    #[test]
    fn decode_rejects_wrong_shape() {
        assert!(decode_var(VarType::String, "5").is_err());
        assert!(decode_var(VarType::Bool, "not json").is_err());
    }

    #[test]
    fn list_values_keep_their_types() {
        let list = Var::List(NList::new().with(1i64).with("a").with(Nuid::new(1, 2)));
        let text = encode_var(&list).unwrap();
        assert_eq!(decode_var(VarType::List, &text).unwrap(), list);
    }

    #[test]
    fn row_arity_checked() {
        let err = decode_row(&[VarType::Int, VarType::Long], "[1]").unwrap_err();
        assert_eq!(
            err,
            CodecError::RowArity {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn non_finite_float_rejected() {
        assert!(encode_var(&Var::Float(f32::NAN)).is_err());
    }

    proptest! {
        #[test]
        fn row_decodes_against_its_columns(
            flag in any::<bool>(),
            count in any::<i32>(),
            total in any::<i64>(),
            ratio in any::<i16>().prop_map(|v| f32::from(v) / 8.0),
            label in ".{0,16}",
        ) {
            let columns = [
                VarType::Bool,
                VarType::Int,
                VarType::Long,
                VarType::Float,
                VarType::String,
            ];
            let row = NList::new()
                .with(flag)
                .with(count)
                .with(total)
                .with(ratio)
                .with(label);
            let text = encode_row(&row).unwrap();
            prop_assert_eq!(decode_row(&columns, &text).unwrap(), row);
        }
    }
}
