//! Business-module callbacks.
//!
//! Game logic lives in [`Module`]s registered on the cluster's
//! [`ModuleDispatcher`]. The node calls the dispatcher once per type in an
//! entity's dispatch chain, farthest ancestor first, so a module can handle
//! `item` events by matching on the `entity_type` it is called with, and a
//! generic handler registered for an ancestor sees every descendant.
//!
//! Hooks receive the node and may call back into it. Calls on ids of the
//! same shard run inline; calls on other shards are forwarded.

use crate::error::CoreResult;
use crate::event::{EntityEvent, FieldDelta, FieldEvent, TableDelta, TableEvent};
use crate::node::Node;
use async_trait::async_trait;
use entishard_codec::{NList, Nuid};
use std::sync::Arc;
use tracing::error;

/// A business module. Every hook defaults to doing nothing.
#[async_trait]
pub trait Module: Send + Sync {
    /// Entity lifecycle event for `entity_type` (the entity's type or one
    /// of its ancestors). `args` are the create arguments, empty otherwise.
    async fn on_entity(
        &self,
        _node: &mut Node,
        _entity_type: &str,
        _id: Nuid,
        _event: EntityEvent,
        _args: &NList,
    ) -> CoreResult<()> {
        Ok(())
    }

    /// A field changed.
    async fn on_field(
        &self,
        _node: &mut Node,
        _entity_type: &str,
        _id: Nuid,
        _name: &str,
        _event: FieldEvent,
        _delta: &FieldDelta,
    ) -> CoreResult<()> {
        Ok(())
    }

    /// A table changed.
    async fn on_table(
        &self,
        _node: &mut Node,
        _entity_type: &str,
        _id: Nuid,
        _name: &str,
        _event: TableEvent,
        _delta: &TableDelta,
    ) -> CoreResult<()> {
        Ok(())
    }

    /// A command addressed to an entity.
    async fn on_command(&self, _node: &mut Node, _id: Nuid, _command: i32, _args: &NList) -> CoreResult<()> {
        Ok(())
    }

    /// A custom event addressed to an entity.
    async fn on_custom(&self, _node: &mut Node, _id: Nuid, _custom: i32, _args: &NList) -> CoreResult<()> {
        Ok(())
    }

    /// An entity timer fired. `remaining` is the number of beats left for a
    /// counted heartbeat, `None` for countdowns and endless heartbeats.
    async fn on_timer(&self, _node: &mut Node, _id: Nuid, _name: &str, _remaining: Option<u32>) -> CoreResult<()> {
        Ok(())
    }
}

/// Calls every registered module, in registration order.
///
/// A failing module is logged and does not stop the others; callers never
/// see module errors.
#[derive(Clone, Default)]
pub struct ModuleDispatcher {
    modules: Vec<Arc<dyn Module>>,
}

impl ModuleDispatcher {
    /// Creates a dispatcher with no modules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module.
    pub fn register(&mut self, module: Arc<dyn Module>) {
        self.modules.push(module);
    }

    /// Registers a module, builder style.
    #[must_use]
    pub fn with(mut self, module: Arc<dyn Module>) -> Self {
        self.register(module);
        self
    }

    /// Number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns true if no module is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Dispatches an entity event.
    pub async fn callback_entity(
        &self,
        node: &mut Node,
        entity_type: &str,
        id: Nuid,
        event: EntityEvent,
        args: &NList,
    ) {
        for module in &self.modules {
            if let Err(e) = module.on_entity(node, entity_type, id, event, args).await {
                error!(%id, entity_type, ?event, error = %e, "entity callback failed");
            }
        }
    }

    /// Dispatches a field change.
    pub async fn callback_field(
        &self,
        node: &mut Node,
        entity_type: &str,
        id: Nuid,
        name: &str,
        event: FieldEvent,
        delta: &FieldDelta,
    ) {
        for module in &self.modules {
            if let Err(e) = module.on_field(node, entity_type, id, name, event, delta).await {
                error!(%id, entity_type, name, error = %e, "field callback failed");
            }
        }
    }

    /// Dispatches a table change.
    pub async fn callback_table(
        &self,
        node: &mut Node,
        entity_type: &str,
        id: Nuid,
        name: &str,
        event: TableEvent,
        delta: &TableDelta,
    ) {
        for module in &self.modules {
            if let Err(e) = module.on_table(node, entity_type, id, name, event, delta).await {
                error!(%id, entity_type, name, ?event, error = %e, "table callback failed");
            }
        }
    }

    /// Dispatches a command.
    pub async fn callback_command(&self, node: &mut Node, id: Nuid, command: i32, args: &NList) {
        for module in &self.modules {
            if let Err(e) = module.on_command(node, id, command, args).await {
                error!(%id, command, error = %e, "command callback failed");
            }
        }
    }

    /// Dispatches a custom event.
    pub async fn callback_custom(&self, node: &mut Node, id: Nuid, custom: i32, args: &NList) {
        for module in &self.modules {
            if let Err(e) = module.on_custom(node, id, custom, args).await {
                error!(%id, custom, error = %e, "custom callback failed");
            }
        }
    }

    /// Dispatches a timer.
    pub async fn callback_timer(&self, node: &mut Node, id: Nuid, name: &str, remaining: Option<u32>) {
        for module in &self.modules {
            if let Err(e) = module.on_timer(node, id, name, remaining).await {
                error!(%id, timer = name, error = %e, "timer callback failed");
            }
        }
    }
}

impl std::fmt::Debug for ModuleDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDispatcher")
            .field("modules", &self.modules.len())
            .finish()
    }
}
