//! # entishard testkit
//!
//! Test utilities for entishard.
//!
//! This crate provides:
//! - Schema fixtures (`player`, `item`, a `base`/`mid`/`leaf` chain and a
//!   probe type with one field per value type)
//! - [`TestCluster`], a cluster wired to inspectable in-memory stores
//! - [`RecordingModule`] and [`RecordingAgent`], which capture callbacks and
//!   sync messages in arrival order
//! - [`ItemModule`], a small business module used by the item scenario
//! - Property-based generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use entishard_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn level_up() {
//!     let t = TestCluster::new();
//!     let id = t.create_player(1, 7).await;
//!     assert!(t.call(7, move |node| node.set_field(id, "level", 2)).await.unwrap());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod recording;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::recording::*;
    pub use entishard_codec::{KeyType, NList, Nuid, RowKey, Var, VarType, VarValue};
    pub use entishard_core::{
        Cluster, Config, Entity, EntityEvent, FieldDelta, FieldEvent, Node, StorageMode,
        SyncMessage, TableDelta, TableEvent,
    };
}

pub use fixtures::*;
pub use generators::*;
pub use recording::*;
