//! Recording hooks.
//!
//! [`RecordingModule`] captures every dispatched callback and
//! [`RecordingAgent`] every delivered sync message, in arrival order, so
//! tests can assert on the exact pipeline output.

use async_trait::async_trait;
use entishard_codec::{NList, Nuid};
use entishard_core::{
    Agent, CoreError, CoreResult, EntityEvent, FieldDelta, FieldEvent, Module, Node, SyncMessage,
    TableDelta, TableEvent,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// One dispatched callback.
#[derive(Debug, Clone, PartialEq)]
pub enum Callback {
    /// Entity lifecycle event.
    Entity {
        /// Type the dispatch was made for.
        entity_type: String,
        /// Entity id.
        id: Nuid,
        /// Event.
        event: EntityEvent,
        /// Create arguments.
        args: NList,
    },
    /// Field change.
    Field {
        /// Type the dispatch was made for.
        entity_type: String,
        /// Entity id.
        id: Nuid,
        /// Field name.
        name: String,
        /// Change.
        delta: FieldDelta,
    },
    /// Table change.
    Table {
        /// Type the dispatch was made for.
        entity_type: String,
        /// Entity id.
        id: Nuid,
        /// Table name.
        name: String,
        /// Event.
        event: TableEvent,
        /// Change.
        delta: TableDelta,
    },
    /// Command.
    Command {
        /// Entity id.
        id: Nuid,
        /// Command code.
        command: i32,
        /// Payload.
        args: NList,
    },
    /// Custom event.
    Custom {
        /// Entity id.
        id: Nuid,
        /// Event code.
        custom: i32,
        /// Payload.
        args: NList,
    },
    /// Timer.
    Timer {
        /// Entity id.
        id: Nuid,
        /// Timer name.
        name: String,
        /// Beats left.
        remaining: Option<u32>,
    },
}

impl Callback {
    /// The entity the callback concerns.
    pub fn id(&self) -> Nuid {
        match self {
            Callback::Entity { id, .. }
            | Callback::Field { id, .. }
            | Callback::Table { id, .. }
            | Callback::Command { id, .. }
            | Callback::Custom { id, .. }
            | Callback::Timer { id, .. } => *id,
        }
    }
}

/// A module that records every callback.
#[derive(Debug, Default)]
pub struct RecordingModule {
    records: Mutex<Vec<Callback>>,
}

impl RecordingModule {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every callback so far.
    pub fn records(&self) -> Vec<Callback> {
        self.records.lock().clone()
    }

    /// Returns and forgets every callback so far.
    pub fn take(&self) -> Vec<Callback> {
        std::mem::take(&mut *self.records.lock())
    }

    /// Callbacks concerning `id`.
    pub fn for_entity(&self, id: Nuid) -> Vec<Callback> {
        self.records
            .lock()
            .iter()
            .filter(|c| c.id() == id)
            .cloned()
            .collect()
    }

    /// `(dispatched type, event)` of every entity callback for `id`.
    pub fn entity_events(&self, id: Nuid) -> Vec<(String, EntityEvent)> {
        self.records
            .lock()
            .iter()
            .filter_map(|c| match c {
                Callback::Entity {
                    entity_type,
                    id: cid,
                    event,
                    ..
                } if *cid == id => Some((entity_type.clone(), *event)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, callback: Callback) {
        self.records.lock().push(callback);
    }
}

#[async_trait]
impl Module for RecordingModule {
    async fn on_entity(
        &self,
        _node: &mut Node,
        entity_type: &str,
        id: Nuid,
        event: EntityEvent,
        args: &NList,
    ) -> CoreResult<()> {
        self.push(Callback::Entity {
            entity_type: entity_type.to_string(),
            id,
            event,
            args: args.clone(),
        });
        Ok(())
    }

    async fn on_field(
        &self,
        _node: &mut Node,
        entity_type: &str,
        id: Nuid,
        name: &str,
        _event: FieldEvent,
        delta: &FieldDelta,
    ) -> CoreResult<()> {
        self.push(Callback::Field {
            entity_type: entity_type.to_string(),
            id,
            name: name.to_string(),
            delta: delta.clone(),
        });
        Ok(())
    }

    async fn on_table(
        &self,
        _node: &mut Node,
        entity_type: &str,
        id: Nuid,
        name: &str,
        event: TableEvent,
        delta: &TableDelta,
    ) -> CoreResult<()> {
        self.push(Callback::Table {
            entity_type: entity_type.to_string(),
            id,
            name: name.to_string(),
            event,
            delta: delta.clone(),
        });
        Ok(())
    }

    async fn on_command(&self, _node: &mut Node, id: Nuid, command: i32, args: &NList) -> CoreResult<()> {
        self.push(Callback::Command {
            id,
            command,
            args: args.clone(),
        });
        Ok(())
    }

    async fn on_custom(&self, _node: &mut Node, id: Nuid, custom: i32, args: &NList) -> CoreResult<()> {
        self.push(Callback::Custom {
            id,
            custom,
            args: args.clone(),
        });
        Ok(())
    }

    async fn on_timer(&self, _node: &mut Node, id: Nuid, name: &str, remaining: Option<u32>) -> CoreResult<()> {
        self.push(Callback::Timer {
            id,
            name: name.to_string(),
            remaining,
        });
        Ok(())
    }
}

/// An agent that records every message it is sent.
#[derive(Debug, Default)]
pub struct RecordingAgent {
    messages: Mutex<Vec<SyncMessage>>,
    failing: AtomicBool,
}

impl RecordingAgent {
    /// Creates an empty agent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message delivered so far.
    pub fn messages(&self) -> Vec<SyncMessage> {
        self.messages.lock().clone()
    }

    /// Returns and forgets every message so far.
    pub fn take(&self) -> Vec<SyncMessage> {
        std::mem::take(&mut *self.messages.lock())
    }

    /// Number of messages delivered.
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Returns true if nothing was delivered.
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Makes every delivery fail while set.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Agent for RecordingAgent {
    async fn send_message(&self, message: SyncMessage) -> CoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoreError::NodeUnavailable {
                origin: message.id().origin,
            });
        }
        self.messages.lock().push(message);
        Ok(())
    }
}
