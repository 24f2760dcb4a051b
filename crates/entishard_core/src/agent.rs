//! Client agents.
//!
//! An [`Agent`] stands for the client session bound to a node. The node
//! pushes [`SyncMessage`]s to it while the node is active; delivery is best
//! effort and failures are logged, not retried.

use crate::error::CoreResult;
use crate::event::SyncMessage;
use async_trait::async_trait;

/// The receiving end of a node's sync messages.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Delivers one message to the client.
    async fn send_message(&self, message: SyncMessage) -> CoreResult<()>;
}
