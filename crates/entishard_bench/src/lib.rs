//! Benchmark utilities.

#![warn(missing_docs)]

use entishard_codec::{NList, Nuid, Var, VarType};
use entishard_core::{
    Entity, EntityManager, EntityPrefab, EntityStorage, FieldPrefab, Schema, TablePrefab,
};
use rand::Rng;
use std::sync::Arc;

/// A player type with saved fields and one saved table.
pub fn bench_schema() -> Arc<Schema> {
    Arc::new(
        Schema::new().with(
            EntityPrefab::new("player")
                .field(FieldPrefab::new("level", VarType::Int).save().sync())
                .field(FieldPrefab::new("nick_name", VarType::String).save())
                .field(FieldPrefab::new("gold", VarType::Long).save())
                .table(
                    TablePrefab::new("quest_table", VarType::Int)
                        .column("status", VarType::Int)
                        .column("accept_time", VarType::Long)
                        .save(),
                ),
        ),
    )
}

/// A random quest row.
pub fn random_row() -> NList {
    let mut rng = rand::thread_rng();
    NList::new()
        .with(rng.gen_range(0i32..4))
        .with(rng.gen::<i64>())
}

/// Generate `count` players on shard `origin`, each with `rows` quests.
pub async fn generate_players(origin: i64, count: usize, rows: usize) -> Vec<Entity> {
    let schema = bench_schema();
    let mut manager = EntityManager::new(schema);
    let mut rng = rand::thread_rng();
    for unique in 1..=count as i64 {
        let id = Nuid::new(unique, origin);
        manager
            .create(id, "player")
            .await
            .expect("player is declared");
        manager
            .set_field(id, "level", Var::Int(rng.gen_range(1..100)))
            .await
            .expect("level is an int");
        manager
            .set_field(id, "nick_name", format!("player{unique}").into())
            .await
            .expect("nick_name is a string");
        for key in 0..rows as i32 {
            manager
                .set_row(id, "quest_table", key.into(), random_row())
                .await
                .expect("row matches columns");
        }
    }
    manager.entities().await.expect("hot storage cannot fail")
}
