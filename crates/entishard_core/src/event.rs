//! Change events, deltas and client sync messages.
//!
//! Every committed mutation produces a delta. The node hands the same delta
//! to each module along the entity type's dispatch chain and, when the
//! schema flags the field or table as `sync`, wraps it in a [`SyncMessage`]
//! for the bound agent.

use crate::entity::Entity;
use entishard_codec::{NList, Nuid, RowKey, Var};
use serde::{Deserialize, Serialize};

/// Entity lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityEvent {
    /// Created; carries the constructor arguments.
    Create,
    /// Restored from a persistence snapshot into a hot node.
    Load,
    /// Became visible to the bound client.
    Entry,
    /// Stopped being visible to the bound client.
    Leave,
    /// Destroyed; state is already gone when this fires.
    Destroy,
}

impl EntityEvent {
    /// Numeric code used on the wire.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            EntityEvent::Create => 1,
            EntityEvent::Load => 2,
            EntityEvent::Entry => 3,
            EntityEvent::Leave => 4,
            EntityEvent::Destroy => 5,
        }
    }
}

/// Field events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldEvent {
    /// The value changed.
    Change,
}

impl FieldEvent {
    /// Numeric code used on the wire.
    #[must_use]
    pub const fn code(&self) -> i32 {
        1
    }
}

/// Table events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableEvent {
    /// A row was added.
    AddKey,
    /// A row was replaced.
    SetKey,
    /// A row was deleted.
    DelKey,
    /// One column of a row changed.
    SetCol,
    /// All rows were removed.
    Clear,
}

impl TableEvent {
    /// Numeric code used on the wire.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            TableEvent::AddKey => 1,
            TableEvent::SetKey => 2,
            TableEvent::DelKey => 3,
            TableEvent::SetCol => 4,
            TableEvent::Clear => 5,
        }
    }
}

/// Payload of a field change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDelta {
    /// Value before the change.
    pub old: Var,
    /// Value after the change.
    pub new: Var,
}

/// Payload of a table change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableDelta {
    /// A whole row: the new row for add/set, the removed row for delete.
    Row {
        /// Row key.
        key: RowKey,
        /// Row value.
        value: NList,
    },
    /// One column of a row.
    Col {
        /// Row key.
        key: RowKey,
        /// Column index.
        col: usize,
        /// Value before the change.
        old: Var,
        /// Value after the change.
        new: Var,
    },
    /// All rows removed.
    Cleared,
}

impl TableDelta {
    /// The row key the delta concerns, if any.
    #[must_use]
    pub fn key(&self) -> Option<&RowKey> {
        match self {
            TableDelta::Row { key, .. } | TableDelta::Col { key, .. } => Some(key),
            TableDelta::Cleared => None,
        }
    }
}

/// A message pushed to the agent bound to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncMessage {
    /// Entry (with full state), leave or destroy (id only) of an entity.
    Entity {
        /// Entity id.
        id: Nuid,
        /// Lifecycle event.
        event: EntityEvent,
        /// Full state, present for entry only.
        entity: Option<Entity>,
    },
    /// A synced field changed.
    Field {
        /// Entity id.
        id: Nuid,
        /// Field name.
        name: String,
        /// Field event.
        event: FieldEvent,
        /// The change.
        delta: FieldDelta,
    },
    /// A synced table changed.
    Table {
        /// Entity id.
        id: Nuid,
        /// Table name.
        name: String,
        /// Table event.
        event: TableEvent,
        /// The change.
        delta: TableDelta,
    },
}

impl SyncMessage {
    /// Server message code of this kind of sync.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            SyncMessage::Entity { .. } => 13,
            SyncMessage::Field { .. } => 14,
            SyncMessage::Table { .. } => 15,
        }
    }

    /// The entity the message concerns.
    #[must_use]
    pub const fn id(&self) -> Nuid {
        match self {
            SyncMessage::Entity { id, .. }
            | SyncMessage::Field { id, .. }
            | SyncMessage::Table { id, .. } => *id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_codes() {
        let id = Nuid::new(1, 1);
        let entity = SyncMessage::Entity {
            id,
            event: EntityEvent::Leave,
            entity: None,
        };
        let table = SyncMessage::Table {
            id,
            name: "star_table".into(),
            event: TableEvent::Clear,
            delta: TableDelta::Cleared,
        };
        assert_eq!(entity.code(), 13);
        assert_eq!(table.code(), 15);
        assert_eq!(table.id(), id);
    }

    #[test]
    fn table_delta_key() {
        let delta = TableDelta::Col {
            key: RowKey::Int(3),
            col: 0,
            old: Var::Int(1),
            new: Var::Int(2),
        };
        assert_eq!(delta.key(), Some(&RowKey::Int(3)));
        assert_eq!(TableDelta::Cleared.key(), None);
    }
}
