//! Keyed table of typed rows.

use super::field::check_value;
use crate::error::{CoreError, CoreResult};
use crate::event::TableDelta;
use crate::schema::TablePrefab;
use entishard_codec::{KeyType, NList, RowKey, Var, VarType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A table mapping primary keys to rows.
///
/// Every row has exactly the declared columns, in order, with the declared
/// types. Keys are all of the declared key type. Rows iterate in key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    name: String,
    key_type: KeyType,
    columns: Vec<VarType>,
    #[serde(with = "rows_as_pairs")]
    rows: BTreeMap<RowKey, NList>,
}

impl Table {
    /// Creates an empty table.
    pub fn new(name: impl Into<String>, key_type: KeyType, columns: Vec<VarType>) -> Self {
        Self {
            name: name.into(),
            key_type,
            columns,
            rows: BTreeMap::new(),
        }
    }

    /// Creates an empty table from its declaration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` if the declared key type cannot key a table.
    pub fn from_prefab(prefab: &TablePrefab) -> CoreResult<Self> {
        Ok(Self::new(
            prefab.name.as_str(),
            prefab.key_type()?,
            prefab.column_types(),
        ))
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key type.
    #[must_use]
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Column types.
    #[must_use]
    pub fn columns(&self) -> &[VarType] {
        &self.columns
    }

    /// Inserts or replaces a row.
    ///
    /// # Errors
    ///
    /// Returns `KeyTypeMismatch`, `RowArity` or `TypeMismatch` if the key or
    /// row does not fit the declaration. The table is unchanged.
    pub fn set_row(&mut self, key: RowKey, row: NList) -> CoreResult<TableDelta> {
        check_key(&self.name, self.key_type, &key)?;
        check_row(&self.name, &self.columns, &row)?;
        self.rows.insert(key.clone(), row.clone());
        Ok(TableDelta::Row { key, value: row })
    }

    /// Deletes a row, returning it in the delta.
    ///
    /// # Errors
    ///
    /// Returns `RowNotFound` if no row has this key.
    pub fn delete_row(&mut self, key: &RowKey) -> CoreResult<TableDelta> {
        let value = self
            .rows
            .remove(key)
            .ok_or_else(|| CoreError::row_not_found(self.name.as_str(), key))?;
        Ok(TableDelta::Row {
            key: key.clone(),
            value,
        })
    }

    /// Sets one column of an existing row.
    ///
    /// Returns `Ok(None)` when the column already holds `value`.
    ///
    /// # Errors
    ///
    /// Returns `RowNotFound`, `ColumnOutOfRange` or `TypeMismatch`.
    pub fn set_col(&mut self, key: &RowKey, col: usize, value: Var) -> CoreResult<Option<TableDelta>> {
        let expected = check_col(&self.name, &self.columns, col, &value)?;
        let row = self
            .rows
            .get_mut(key)
            .ok_or_else(|| CoreError::row_not_found(self.name.as_str(), key))?;
        let slot = row.get_mut(col).ok_or_else(|| CoreError::ColumnOutOfRange {
            table: self.name.clone(),
            col,
            columns: expected,
        })?;
        if *slot == value {
            return Ok(None);
        }
        let old = std::mem::replace(slot, value.clone());
        Ok(Some(TableDelta::Col {
            key: key.clone(),
            col,
            old,
            new: value,
        }))
    }

    /// Reads one column.
    #[must_use]
    pub fn get_col(&self, key: &RowKey, col: usize) -> Option<&Var> {
        self.rows.get(key).and_then(|row| row.get(col))
    }

    /// Reads a row.
    #[must_use]
    pub fn row(&self, key: &RowKey) -> Option<&NList> {
        self.rows.get(key)
    }

    /// Returns true if a row has this key.
    #[must_use]
    pub fn contains(&self, key: &RowKey) -> bool {
        self.rows.contains_key(key)
    }

    /// All keys, in order.
    #[must_use]
    pub fn keys(&self) -> Vec<RowKey> {
        self.rows.keys().cloned().collect()
    }

    /// Iterates over rows in key order.
    pub fn rows(&self) -> impl Iterator<Item = (&RowKey, &NList)> {
        self.rows.iter()
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Removes all rows.
    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

pub(crate) fn check_key(table: &str, key_type: KeyType, key: &RowKey) -> CoreResult<()> {
    if key.key_type() == key_type {
        Ok(())
    } else {
        Err(CoreError::KeyTypeMismatch {
            table: table.to_string(),
            expected: key_type,
            found: key.key_type(),
        })
    }
}

pub(crate) fn check_row(table: &str, columns: &[VarType], row: &NList) -> CoreResult<()> {
    if row.len() != columns.len() {
        return Err(CoreError::RowArity {
            table: table.to_string(),
            expected: columns.len(),
            found: row.len(),
        });
    }
    for (col, (value, expected)) in row.iter().zip(columns).enumerate() {
        check_value(&format!("{table}[{col}]"), *expected, value)?;
    }
    Ok(())
}

/// Checks a column write, returning the column count.
pub(crate) fn check_col(table: &str, columns: &[VarType], col: usize, value: &Var) -> CoreResult<usize> {
    let expected = columns.get(col).ok_or_else(|| CoreError::ColumnOutOfRange {
        table: table.to_string(),
        col,
        columns: columns.len(),
    })?;
    check_value(&format!("{table}[{col}]"), *expected, value)?;
    Ok(columns.len())
}

/// Rows serialize as a sequence of `(key, row)` pairs so that formats with
/// string-only map keys can carry any key type.
mod rows_as_pairs {
    use entishard_codec::{NList, RowKey};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        rows: &BTreeMap<RowKey, NList>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(rows.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<RowKey, NList>, D::Error> {
        let pairs = Vec::<(RowKey, NList)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn quests() -> Table {
        Table::new("quest_table", KeyType::Int, vec![VarType::Int, VarType::Long])
    }

    fn row(status: i32, time: i64) -> NList {
        NList::new().with(status).with(time)
    }

    #[test]
    fn table_set_row_inserts_and_replaces() {
        let mut table = quests();
        let delta = table.set_row(RowKey::Int(1), row(0, 100)).unwrap();
        assert_eq!(
            delta,
            TableDelta::Row {
                key: RowKey::Int(1),
                value: row(0, 100)
            }
        );
        table.set_row(RowKey::Int(1), row(1, 200)).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.row(&RowKey::Int(1)), Some(&row(1, 200)));
    }

    #[test]
    fn table_rejects_wrong_key_type() {
        let mut table = quests();
        let err = table.set_row(RowKey::Long(1), row(0, 0)).unwrap_err();
        assert!(matches!(err, CoreError::KeyTypeMismatch { .. }));
        assert!(table.is_empty());
    }

    #[test]
    fn table_rejects_bad_rows() {
        let mut table = quests();
        let short = NList::new().with(1);
        assert!(matches!(
            table.set_row(RowKey::Int(1), short),
            Err(CoreError::RowArity { expected: 2, found: 1, .. })
        ));
        let swapped = NList::new().with(1i64).with(1);
        assert!(matches!(
            table.set_row(RowKey::Int(1), swapped),
            Err(CoreError::TypeMismatch { .. })
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn table_delete_returns_old_row() {
        let mut table = quests();
        table.set_row(RowKey::Int(7), row(2, 5)).unwrap();
        let delta = table.delete_row(&RowKey::Int(7)).unwrap();
        assert_eq!(
            delta,
            TableDelta::Row {
                key: RowKey::Int(7),
                value: row(2, 5)
            }
        );
        assert!(matches!(
            table.delete_row(&RowKey::Int(7)),
            Err(CoreError::RowNotFound { .. })
        ));
    }

    #[test]
    fn table_set_col() {
        let mut table = quests();
        table.set_row(RowKey::Int(1), row(0, 10)).unwrap();

        let delta = table.set_col(&RowKey::Int(1), 0, Var::Int(3)).unwrap().unwrap();
        assert_eq!(
            delta,
            TableDelta::Col {
                key: RowKey::Int(1),
                col: 0,
                old: Var::Int(0),
                new: Var::Int(3)
            }
        );
        assert_eq!(table.get_col(&RowKey::Int(1), 0), Some(&Var::Int(3)));

        assert!(table.set_col(&RowKey::Int(1), 0, Var::Int(3)).unwrap().is_none());
        assert!(table.set_col(&RowKey::Int(2), 0, Var::Int(3)).is_err());
        assert!(table.set_col(&RowKey::Int(1), 2, Var::Int(3)).is_err());
        assert!(table.set_col(&RowKey::Int(1), 1, Var::Int(3)).is_err());
    }

    #[test]
    fn table_keys_are_ordered() {
        let mut table = quests();
        for k in [30, 10, 20] {
            table.set_row(RowKey::Int(k), row(0, 0)).unwrap();
        }
        assert_eq!(
            table.keys(),
            vec![RowKey::Int(10), RowKey::Int(20), RowKey::Int(30)]
        );
        table.clear();
        assert!(table.keys().is_empty());
    }

    #[test]
    fn table_serializes_to_json() {
        let mut table = quests();
        table.set_row(RowKey::Int(1), row(0, 10)).unwrap();
        let text = serde_json::to_string(&table).unwrap();
        let back: Table = serde_json::from_str(&text).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn table_rejects_non_finite_column() {
        let mut table = Table::new("drops", KeyType::Int, vec![VarType::Float]);
        let err = table
            .set_row(RowKey::Int(1), NList::new().with(f32::NAN))
            .unwrap_err();
        assert!(matches!(err, CoreError::NonFiniteFloat { .. }));
        table.set_row(RowKey::Int(1), NList::new().with(0.5f32)).unwrap();
        let err = table
            .set_col(&RowKey::Int(1), 0, Var::Float(f32::INFINITY))
            .unwrap_err();
        assert!(matches!(err, CoreError::NonFiniteFloat { .. }));
        assert_eq!(table.get_col(&RowKey::Int(1), 0), Some(&Var::Float(0.5)));
    }

    proptest! {
        #[test]
        fn table_matches_ordered_map(
            ops in prop::collection::vec((0i32..8, prop::option::of((0i32..4, 0i64..100))), 0..40),
        ) {
            let mut table = quests();
            let mut model = BTreeMap::new();
            for (key, op) in ops {
                let key = RowKey::Int(key);
                match op {
                    Some((status, time)) => {
                        table.set_row(key.clone(), row(status, time)).unwrap();
                        model.insert(key.clone(), row(status, time));
                        // Writing the stored value back is a no-op.
                        prop_assert!(table.set_col(&key, 0, Var::Int(status)).unwrap().is_none());
                    }
                    None => {
                        prop_assert_eq!(table.delete_row(&key).is_ok(), model.remove(&key).is_some());
                    }
                }
            }
            prop_assert_eq!(table.keys(), model.keys().cloned().collect::<Vec<_>>());
            for (key, value) in &model {
                prop_assert_eq!(table.row(key), Some(value));
            }
        }
    }
}
