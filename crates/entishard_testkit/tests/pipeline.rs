//! Callback dispatch along the ancestor chain, and sync gating.

use entishard_testkit::prelude::*;

#[tokio::test]
async fn pipeline_dispatches_farthest_ancestor_first() {
    let t = TestCluster::new();
    let id = t.create(Nuid::new(1, 1), "leaf", NList::new()).await;
    assert_eq!(
        t.recorder.entity_events(id),
        vec![
            ("base".to_string(), EntityEvent::Create),
            ("mid".to_string(), EntityEvent::Create),
            ("leaf".to_string(), EntityEvent::Create),
        ]
    );

    t.recorder.take();
    assert!(t.call(1, move |node| node.set_field(id, "hp", 40)).await.unwrap());
    let delta = FieldDelta {
        old: Var::Int(0),
        new: Var::Int(40),
    };
    let expected: Vec<Callback> = ["base", "mid", "leaf"]
        .into_iter()
        .map(|entity_type| Callback::Field {
            entity_type: entity_type.to_string(),
            id,
            name: "hp".to_string(),
            delta: delta.clone(),
        })
        .collect();
    assert_eq!(t.recorder.records(), expected);
    t.shutdown().await;
}

#[tokio::test]
async fn pipeline_item_scenario() {
    let t = TestCluster::new();
    let agent = t.bind_agent(1).await;
    t.activate(1).await;

    let id = t
        .create(Nuid::new(1, 1), "item", NList::new().with(20001).with(1))
        .await;
    let creates: Vec<Callback> = t
        .recorder
        .for_entity(id)
        .into_iter()
        .filter(|c| matches!(c, Callback::Entity { event: EntityEvent::Create, .. }))
        .collect();
    assert_eq!(creates.len(), 2);
    assert_eq!(
        creates[1],
        Callback::Entity {
            entity_type: "item".to_string(),
            id,
            event: EntityEvent::Create,
            args: NList::new().with(20001).with(1),
        }
    );
    let entry = t.call(1, move |node| node.get_field::<i32>(id, "entry")).await.unwrap();
    let count = t.call(1, move |node| node.get_field::<i32>(id, "count")).await.unwrap();
    assert_eq!((entry, count), (20001, 1));

    t.call(1, move |node| node.entry(id)).await.unwrap();
    t.recorder.take();
    agent.take();

    assert!(t
        .call(1, move |node| {
            node.add_key_value(id, "star_table", 1001, NList::new().with(1))
        })
        .await
        .unwrap());
    let added = TableDelta::Row {
        key: RowKey::Int(1001),
        value: NList::new().with(1),
    };
    let item_tables: Vec<Callback> = t
        .recorder
        .records()
        .into_iter()
        .filter(|c| matches!(c, Callback::Table { entity_type, .. } if entity_type == "item"))
        .collect();
    assert_eq!(
        item_tables,
        vec![Callback::Table {
            entity_type: "item".to_string(),
            id,
            name: "star_table".to_string(),
            event: TableEvent::AddKey,
            delta: added.clone(),
        }]
    );
    assert_eq!(
        agent.take(),
        vec![SyncMessage::Table {
            id,
            name: "star_table".to_string(),
            event: TableEvent::AddKey,
            delta: added,
        }]
    );

    t.call(1, move |node| node.destroy(id)).await.unwrap();
    assert_eq!(
        t.recorder.entity_events(id),
        vec![
            ("goods".to_string(), EntityEvent::Destroy),
            ("item".to_string(), EntityEvent::Destroy),
        ]
    );
    assert_eq!(
        agent.take(),
        vec![SyncMessage::Entity {
            id,
            event: EntityEvent::Destroy,
            entity: None,
        }]
    );
    assert!(!t.call(1, move |node| node.exists(id)).await.unwrap());
    t.shutdown().await;
}

#[tokio::test]
async fn pipeline_sync_stops_after_deactive() {
    let t = TestCluster::new();
    let id = t.create_player(1, 1).await;
    let agent = t.bind_agent(1).await;
    t.activate(1).await;

    let messages = agent.take();
    assert_eq!(messages.len(), 1);
    assert!(matches!(
        &messages[0],
        SyncMessage::Entity { event: EntityEvent::Entry, entity: Some(e), .. } if e.id() == id
    ));

    assert!(t.call(1, move |node| node.set_field(id, "level", 2)).await.unwrap());
    assert_eq!(agent.len(), 1);

    t.call(1, |node| node.deactive()).await.unwrap();
    assert!(!t.is_active(1));
    t.recorder.take();
    assert!(t.call(1, move |node| node.set_field(id, "level", 3)).await.unwrap());
    assert_eq!(agent.len(), 1);
    // Callbacks still run while inactive.
    assert_eq!(t.recorder.records().len(), 1);
    assert!(t.stats().syncs_dropped() >= 1);
    t.shutdown().await;
}

#[tokio::test]
async fn pipeline_unsynced_and_unactivated_changes_stay_local() {
    let t = TestCluster::new();
    let agent = t.bind_agent(1).await;
    t.activate(1).await;
    let id = t.create_player(1, 1).await;

    // Not entered yet.
    assert!(t.call(1, move |node| node.set_field(id, "level", 5)).await.unwrap());
    assert!(agent.is_empty());

    t.call(1, move |node| node.entry(id)).await.unwrap();
    agent.take();
    assert!(t
        .call(1, move |node| node.set_field(id, "nick_name", "ann"))
        .await
        .unwrap());
    assert!(t
        .call(1, move |node| node.add_key_value(id, "buff_table", "haste", NList::new().with(5i64)))
        .await
        .unwrap());
    assert!(agent.is_empty());
    t.shutdown().await;
}

#[tokio::test]
async fn pipeline_leave_sends_tombstone_then_gates() {
    let t = TestCluster::new();
    let id = t.create_player(1, 1).await;
    let agent = t.bind_agent(1).await;
    t.activate(1).await;
    agent.take();

    t.call(1, move |node| node.leave(id)).await.unwrap();
    assert_eq!(
        agent.take(),
        vec![SyncMessage::Entity {
            id,
            event: EntityEvent::Leave,
            entity: None,
        }]
    );
    assert!(t.call(1, move |node| node.set_field(id, "level", 9)).await.unwrap());
    assert!(agent.is_empty());
    t.shutdown().await;
}

#[tokio::test]
async fn pipeline_table_deltas_carry_old_values() {
    let t = TestCluster::new();
    let id = t.create_player(1, 1).await;
    let row = NList::new().with(1).with(10i64);
    assert!(t
        .call(1, move |node| node.add_key_value(id, "quest_table", 3, row))
        .await
        .unwrap());
    t.recorder.take();

    assert!(t
        .call(1, move |node| node.set_col(id, "quest_table", 3, 0, 2))
        .await
        .unwrap());
    assert!(!t
        .call(1, move |node| node.set_col(id, "quest_table", 3, 0, 2))
        .await
        .unwrap());
    assert!(!t
        .call(1, move |node| node.set_col(id, "quest_table", 4, 0, 2))
        .await
        .unwrap());
    assert!(t
        .call(1, move |node| node.del_key(id, "quest_table", 3))
        .await
        .unwrap());
    assert!(!t
        .call(1, move |node| node.del_key(id, "quest_table", 3))
        .await
        .unwrap());

    let deltas: Vec<(TableEvent, TableDelta)> = t
        .recorder
        .records()
        .into_iter()
        .filter_map(|c| match c {
            Callback::Table { event, delta, .. } => Some((event, delta)),
            _ => None,
        })
        .collect();
    assert_eq!(
        deltas,
        vec![
            (
                TableEvent::SetCol,
                TableDelta::Col {
                    key: RowKey::Int(3),
                    col: 0,
                    old: Var::Int(1),
                    new: Var::Int(2),
                }
            ),
            (
                TableEvent::DelKey,
                TableDelta::Row {
                    key: RowKey::Int(3),
                    value: NList::new().with(2).with(10i64),
                }
            ),
        ]
    );
    t.shutdown().await;
}

#[tokio::test]
async fn pipeline_failed_delivery_is_counted_not_retried() {
    let t = TestCluster::new();
    let id = t.create_player(1, 1).await;
    let agent = t.bind_agent(1).await;
    t.activate(1).await;
    agent.take();
    agent.set_failing(true);

    let dropped = t.stats().syncs_dropped();
    assert!(t.call(1, move |node| node.set_field(id, "level", 4)).await.unwrap());
    assert_eq!(t.stats().syncs_dropped(), dropped + 1);
    agent.set_failing(false);
    assert!(agent.is_empty());
    t.shutdown().await;
}

async fn assert_noop_sets(t: &TestCluster) {
    let id = t.create(Nuid::new(1, 1), "probe", NList::new()).await;
    let agent = t.bind_agent(1).await;
    t.activate(1).await;
    t.call(1, move |node| node.entry(id)).await.unwrap();
    agent.take();
    let values: Vec<(&str, Var)> = vec![
        ("flag", Var::Bool(true)),
        ("count", Var::Int(3)),
        ("total", Var::Long(1 << 40)),
        ("ratio", Var::Float(1.5)),
        ("label", Var::Str("x".to_string())),
        ("owner", Var::Id(Nuid::new(9, 9))),
        ("tags", Var::List(NList::new().with(1).with("a"))),
    ];
    t.recorder.take();
    for (name, value) in values {
        let first = value.clone();
        let changed = t
            .call(1, move |node| node.set_field(id, name, first))
            .await
            .unwrap();
        assert!(changed, "{name} did not change");
        assert_eq!(agent.take().len(), 1, "{name} first set not synced once");

        let expected = value.clone();
        let unchanged = t
            .call(1, move |node| node.set_field(id, name, value))
            .await
            .unwrap();
        assert!(!unchanged, "{name} changed twice");
        assert!(agent.is_empty(), "{name} repeated set was synced");

        let read = t
            .call(1, move |node| node.get_field_var(id, name))
            .await
            .unwrap();
        assert_eq!(read, Some(expected));
    }
    assert_eq!(t.recorder.records().len(), 7);

    // NaN never compares equal, so it is refused rather than stored.
    for _ in 0..2 {
        let changed = t
            .call(1, move |node| node.set_field(id, "ratio", f32::NAN))
            .await
            .unwrap();
        assert!(!changed);
    }
    assert!(agent.is_empty());
    assert_eq!(t.recorder.records().len(), 7);
    assert_eq!(
        t.call(1, move |node| node.get_field::<f32>(id, "ratio")).await.unwrap(),
        1.5
    );
}

#[tokio::test]
async fn pipeline_noop_set_is_silent_hot() {
    let t = TestCluster::new();
    assert_noop_sets(&t).await;
    t.shutdown().await;
}

#[tokio::test]
async fn pipeline_noop_set_is_silent_cold() {
    let t = TestCluster::cold();
    assert_noop_sets(&t).await;
    t.shutdown().await;
}

#[tokio::test]
async fn pipeline_wrong_type_is_rejected() {
    let t = TestCluster::new();
    let id = t.create_player(1, 1).await;
    t.recorder.take();
    assert!(!t.call(1, move |node| node.set_field(id, "level", "high")).await.unwrap());
    assert!(!t.call(1, move |node| node.set_field(id, "missing", 1)).await.unwrap());
    assert!(t.recorder.records().is_empty());
    assert_eq!(
        t.call(1, move |node| node.get_field::<i32>(id, "missing")).await.unwrap(),
        0
    );
    t.shutdown().await;
}
