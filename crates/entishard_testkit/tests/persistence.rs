//! Shard snapshots: what is saved, when, and how it comes back.

use entishard_core::ShardDocument;
use entishard_testkit::prelude::*;

async fn seed_player(t: &TestCluster, origin: i64) -> Nuid {
    let id = t.create_player(1, origin).await;
    t.call(origin, move |node| {
        Box::pin(async move {
            node.set_field(id, "level", 7).await;
            node.set_field(id, "nick_name", "ann").await;
            node.set_field(id, "exp", 99i64).await;
            node.add_key_value(id, "quest_table", 1, NList::new().with(1).with(1_000i64))
                .await;
            node.add_key_value(id, "quest_table", 2, NList::new().with(0).with(2_000i64))
                .await;
            node.add_key_value(id, "buff_table", "haste", NList::new().with(5i64))
                .await;
        })
    })
    .await
    .unwrap();
    id
}

#[tokio::test]
async fn persistence_saves_flagged_state_only() {
    let t = TestCluster::new();
    seed_player(&t, 5).await;
    assert!(t.deactivate(5).await);

    let doc = t.persistence().find(5).await.unwrap().unwrap();
    assert_eq!(doc.origin, 5);
    assert_eq!(doc.storage_mode, StorageMode::Hot);
    assert_eq!(doc.entities.len(), 1);
    let saved = &doc.entities[0];
    assert_eq!(saved.entity_type, "player");
    assert_eq!(
        saved.fields.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["level", "nick_name"]
    );
    assert_eq!(
        saved.tables.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["quest_table"]
    );
    assert_eq!(saved.tables["quest_table"].len(), 2);
}

#[tokio::test]
async fn persistence_round_trip_through_reactivation() {
    let t = TestCluster::new();
    let id = seed_player(&t, 5).await;
    assert!(t.deactivate(5).await);
    t.recorder.take();

    let level = t.call(5, move |node| node.get_field::<i32>(id, "level")).await.unwrap();
    let nick = t
        .call(5, move |node| node.get_field::<String>(id, "nick_name"))
        .await
        .unwrap();
    let exp = t.call(5, move |node| node.get_field::<i64>(id, "exp")).await.unwrap();
    assert_eq!((level, nick.as_str(), exp), (7, "ann", 0));

    let quest = t
        .call(5, move |node| node.get_key_value(id, "quest_table", 1))
        .await
        .unwrap();
    assert_eq!(quest, Some(NList::new().with(1).with(1_000i64)));
    let buffs = t.call(5, move |node| node.get_keys(id, "buff_table")).await.unwrap();
    assert!(buffs.is_empty());

    assert_eq!(
        t.recorder.entity_events(id),
        vec![("player".to_string(), EntityEvent::Load)]
    );
    assert_eq!(t.stats().activations(), 2);
    t.shutdown().await;
}

#[tokio::test]
async fn persistence_survives_cluster_restart() {
    let t = TestCluster::new();
    let id = seed_player(&t, 3).await;
    let documents = t.documents();
    t.shutdown().await;

    let restarted = TestCluster::with_stores(
        Config::default(),
        std::sync::Arc::new(entishard_storage::InMemoryCache::new(CACHE_DATABASES)),
        documents,
    );
    let entities = restarted.call(3, |node| node.get_entities()).await.unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].id(), id);
    assert_eq!(
        entities[0].field("level").map(|f| f.value().clone()),
        Some(Var::Int(7))
    );
    restarted.shutdown().await;
}

#[tokio::test]
async fn persistence_missing_document_is_an_empty_shard() {
    let t = TestCluster::new();
    assert!(t.call(8, |node| node.get_entities()).await.unwrap().is_empty());
    assert_eq!(t.persistence().storage_mode(8).await.unwrap(), None);
    t.shutdown().await;
    // Nothing to save, nothing written.
    assert_eq!(t.documents().write_count(), 0);
}

#[tokio::test]
async fn persistence_failed_flush_keeps_previous_snapshot() {
    let t = TestCluster::new();
    let id = seed_player(&t, 5).await;
    t.call(5, |node| node.flush()).await.unwrap().unwrap();

    t.call(5, move |node| node.set_field(id, "level", 8)).await.unwrap();
    t.documents().fail_writes(1);
    assert!(t.call(5, |node| node.flush()).await.unwrap().is_err());
    assert_eq!(t.stats().flush_failures(), 1);
    let doc = t.persistence().find(5).await.unwrap().unwrap();
    assert_eq!(doc.entities[0].fields["level"], Var::Int(7));

    t.call(5, |node| node.flush()).await.unwrap().unwrap();
    let doc = t.persistence().find(5).await.unwrap().unwrap();
    assert_eq!(doc.entities[0].fields["level"], Var::Int(8));
    t.shutdown().await;
}

#[tokio::test]
async fn persistence_storage_mode_is_fixed_once() {
    let t = TestCluster::new();
    assert_eq!(t.create_node_with(9, StorageMode::Cold).await.unwrap(), StorageMode::Cold);
    t.shutdown().await;
    assert_eq!(t.create_node_with(9, StorageMode::Hot).await.unwrap(), StorageMode::Cold);
    let mode = t.call(9, |node| Box::pin(async move { node.mode() })).await.unwrap();
    assert_eq!(mode, StorageMode::Cold);
    t.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn persistence_periodic_flush_only_while_active() {
    let t = TestCluster::with_config(
        Config::default().persist_interval(std::time::Duration::from_secs(10)),
    );
    seed_player(&t, 2).await;
    tokio::time::sleep(std::time::Duration::from_secs(25)).await;
    assert_eq!(t.documents().write_count(), 0);

    t.activate(2).await;
    tokio::time::sleep(std::time::Duration::from_secs(25)).await;
    assert!(t.documents().write_count() >= 2);
    t.shutdown().await;
}

#[tokio::test]
async fn persistence_file_store_holds_decodable_documents() {
    let t = TestCluster::file();
    let id = seed_player(&t, 4).await;
    t.shutdown().await;

    let dir = t.path().unwrap().to_path_buf();
    let doc = t.persistence().find(4).await.unwrap().unwrap();
    assert_eq!(doc.entities[0].unique, id.unique);

    let reader = entishard_storage::FileDocumentStore::open_read_only(&dir).unwrap();
    let bytes = reader.read_blocking(4).unwrap().unwrap();
    assert_eq!(ShardDocument::decode(&bytes).unwrap(), doc);
}
