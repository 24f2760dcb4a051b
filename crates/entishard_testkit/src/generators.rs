//! Property-based test generators using proptest.
//!
//! Values are drawn so that they survive every storage path unchanged:
//! floats are exact binary fractions and lists are one level deep.

use entishard_codec::{KeyType, NList, Nuid, RowKey, Var, VarType};
use proptest::prelude::*;

/// Strategy for ids on a handful of shards.
pub fn nuid_strategy() -> impl Strategy<Value = Nuid> {
    (1i64..10_000, 0i64..8).prop_map(|(unique, origin)| Nuid::new(unique, origin))
}

/// Strategy for a value of `var_type`.
pub fn var_strategy(var_type: VarType) -> BoxedStrategy<Var> {
    match var_type {
        VarType::Bool => any::<bool>().prop_map(Var::Bool).boxed(),
        VarType::Int => any::<i32>().prop_map(Var::Int).boxed(),
        VarType::Long => any::<i64>().prop_map(Var::Long).boxed(),
        VarType::Float => (-1_000_000i32..1_000_000)
            .prop_map(|v| Var::Float(v as f32 / 8.0))
            .boxed(),
        VarType::String => "[a-zA-Z0-9 _]{0,16}".prop_map(Var::Str).boxed(),
        VarType::Id => nuid_strategy().prop_map(Var::Id).boxed(),
        VarType::List => prop::collection::vec(
            prop_oneof![
                any::<i32>().prop_map(Var::Int),
                "[a-z]{0,6}".prop_map(Var::Str),
                any::<bool>().prop_map(Var::Bool),
            ],
            0..4,
        )
        .prop_map(|values| Var::List(NList::from(values)))
        .boxed(),
    }
}

/// Strategy for a row of the given column types.
pub fn row_strategy(columns: &[VarType]) -> BoxedStrategy<NList> {
    columns
        .iter()
        .map(|t| var_strategy(*t))
        .collect::<Vec<_>>()
        .prop_map(NList::from)
        .boxed()
}

/// Strategy for a key of `key_type`, drawn from a small range so keys
/// collide often.
pub fn row_key_strategy(key_type: KeyType) -> BoxedStrategy<RowKey> {
    match key_type {
        KeyType::Bool => any::<bool>().prop_map(RowKey::Bool).boxed(),
        KeyType::Int => (0i32..8).prop_map(RowKey::Int).boxed(),
        KeyType::Long => (0i64..8).prop_map(RowKey::Long).boxed(),
        KeyType::String => "[a-c]{1,2}".prop_map(RowKey::Str).boxed(),
        KeyType::Id => (0i64..8).prop_map(|u| RowKey::Id(Nuid::new(u, 1))).boxed(),
    }
}

/// One mutation of a player.
#[derive(Debug, Clone)]
pub enum PlayerOp {
    /// Set `level`.
    SetLevel(i32),
    /// Set `nick_name`.
    SetNick(String),
    /// Set `exp`.
    SetExp(i64),
    /// Add or replace a `quest_table` row.
    PutQuest {
        /// Quest id.
        key: i32,
        /// Status column.
        status: i32,
        /// Accept time column.
        accept_time: i64,
    },
    /// Set the status column of a quest.
    SetStatus {
        /// Quest id.
        key: i32,
        /// New status.
        status: i32,
    },
    /// Delete a quest.
    DelQuest(i32),
    /// Clear `quest_table`.
    ClearQuests,
}

/// Strategy for player mutations.
pub fn player_op_strategy() -> impl Strategy<Value = PlayerOp> {
    prop_oneof![
        2 => (0i32..100).prop_map(PlayerOp::SetLevel),
        1 => "[a-z]{0,8}".prop_map(PlayerOp::SetNick),
        1 => any::<i64>().prop_map(PlayerOp::SetExp),
        4 => (0i32..8, 0i32..4, any::<i64>()).prop_map(|(key, status, accept_time)| {
            PlayerOp::PutQuest { key, status, accept_time }
        }),
        2 => (0i32..8, 0i32..4).prop_map(|(key, status)| PlayerOp::SetStatus { key, status }),
        2 => (0i32..8).prop_map(PlayerOp::DelQuest),
        1 => Just(PlayerOp::ClearQuests),
    ]
}

/// Strategy for a sequence of player mutations.
pub fn player_ops_strategy(min_ops: usize, max_ops: usize) -> impl Strategy<Value = Vec<PlayerOp>> {
    prop::collection::vec(player_op_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
