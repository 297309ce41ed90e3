//! Integration tests: append-condition protocol under sequential and concurrent use.

use std::collections::BTreeSet;
use std::sync::Arc;

use event_store::{
    AppendCondition, AppendConditionViolation, Event, EventStore, EventStoreError, EventStoreExt,
    InMemoryEventStore, Position, Query, QueryItem, ReadOptions,
};
use proptest::prelude::*;
use tokio::sync::Barrier;

fn item_added(cart: &str) -> Event {
    Event::new("ItemAdded", serde_json::json!({})).with_tag(cart)
}

#[tokio::test]
async fn first_append_lands_at_position_one() {
    let store = InMemoryEventStore::new();
    store.append_event(item_added("cart-1"), None).await.unwrap();

    let events = store.read_all().await.unwrap();
    assert_eq!(events.len(), 1);
    let event = events.first().unwrap();
    assert_eq!(event.position, Position::first());
    assert_eq!(event.event_type(), "ItemAdded");
    assert!(event.tags().contains("cart-1"));
}

#[tokio::test]
async fn condition_without_after_fails_when_matches_exist() {
    let store = InMemoryEventStore::new();
    store.append_event(item_added("cart-1"), None).await.unwrap();

    let condition = AppendCondition::fail_if_events_match(Query::from_items([
        QueryItem::for_types(["ItemAdded"]),
    ]));
    let err = store
        .append_event(item_added("cart-1"), Some(condition))
        .await
        .unwrap_err();

    assert!(matches!(
        err.as_condition_violation(),
        Some(AppendConditionViolation::UnexpectedMatch { .. })
    ));
    assert_eq!(
        err.to_string(),
        "The Event Store contained events matching the specified query but none were expected"
    );
}

#[tokio::test]
async fn condition_after_last_match_succeeds() {
    let store = InMemoryEventStore::new();
    store.append_event(item_added("cart-1"), None).await.unwrap();

    let condition = AppendCondition::fail_if_events_match(Query::for_types(["ItemAdded"]))
        .after(Position::first());
    let position = store
        .append_event(item_added("cart-1"), Some(condition))
        .await
        .unwrap();
    assert_eq!(position, Position::new(2));
}

#[tokio::test]
async fn concurrent_appends_produce_gapless_contiguous_batches() {
    let store = InMemoryEventStore::new();
    let workers = 16;
    let appends_per_worker = 25;

    let mut handles = Vec::new();
    for worker in 0..workers {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            for seq in 0..appends_per_worker {
                let batch = (0..3)
                    .map(|i| {
                        Event::new(
                            "Tick",
                            serde_json::json!({"worker": worker, "seq": seq, "i": i}),
                        )
                    })
                    .collect();
                store.append(batch, None).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let events = store.read_all().await.unwrap();
    let total = workers * appends_per_worker * 3;
    assert_eq!(events.len(), total);
    let expected: Vec<_> = (1..=total as u64).map(Position::new).collect();
    assert_eq!(events.positions(), expected);

    // every batch is committed as one contiguous run
    let all: Vec<_> = events.into_vec();
    for chunk in all.chunks(3) {
        let ids: BTreeSet<_> = chunk
            .iter()
            .map(|e| (e.data()["worker"].as_u64(), e.data()["seq"].as_u64()))
            .collect();
        assert_eq!(ids.len(), 1);
        let indices: Vec<_> = chunk.iter().map(|e| e.data()["i"].as_u64().unwrap()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}

#[tokio::test]
async fn only_one_append_claims_a_shared_boundary() {
    let store = InMemoryEventStore::new();
    store.append_event(item_added("cart-1"), None).await.unwrap();

    let query = Query::from(QueryItem::for_types(["ItemAdded"]).tags(["cart-1"]));
    let boundary = store.read_last_event(&query).await.unwrap().unwrap().position;

    let contenders = 32;
    let barrier = Arc::new(Barrier::new(contenders));
    let mut handles = Vec::new();
    for _ in 0..contenders {
        let store = store.clone();
        let barrier = Arc::clone(&barrier);
        let condition = AppendCondition::fail_if_events_match(query.clone()).after(boundary);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            store.append_event(item_added("cart-1"), Some(condition)).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(position) => {
                succeeded += 1;
                assert_eq!(position, Position::new(2));
            }
            Err(EventStoreError::AppendConditionFailed(
                AppendConditionViolation::MatchAfterBoundary { after, last_match },
            )) => {
                assert_eq!(after, boundary);
                assert_eq!(last_match, Position::new(2));
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(succeeded, 1);
    assert_eq!(store.event_count().await, 2);
}

#[tokio::test]
async fn disjoint_boundaries_do_not_conflict() {
    let store = InMemoryEventStore::new();
    let carts = 20;
    let barrier = Arc::new(Barrier::new(carts));

    let mut handles = Vec::new();
    for cart in 0..carts {
        let store = store.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            let tag = format!("cart-{cart}");
            let condition = AppendCondition::fail_if_events_match(Query::for_tags([tag.clone()]));
            barrier.wait().await;
            store.append_event(item_added(&tag), Some(condition)).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
    assert_eq!(store.event_count().await, carts);
}

#[tokio::test]
async fn read_decide_append_loses_no_updates() {
    let store = InMemoryEventStore::new();
    let query = Query::for_tags(["counter"]);
    let workers = 8;
    let increments = 20;

    let mut handles = Vec::new();
    for _ in 0..workers {
        let store = store.clone();
        let query = query.clone();
        handles.push(tokio::spawn(async move {
            let mut done = 0;
            while done < increments {
                let seen = store.read(&query, ReadOptions::forward()).await.unwrap();
                let value = seen.len();
                let mut condition = AppendCondition::fail_if_events_match(query.clone());
                if let Some(last) = seen.last_position() {
                    condition = condition.after(last);
                }
                let event = Event::new("Incremented", serde_json::json!({ "seen": value }))
                    .with_tag("counter");
                match store.append_event(event, Some(condition)).await {
                    Ok(_) => done += 1,
                    Err(EventStoreError::AppendConditionFailed(_)) => tokio::task::yield_now().await,
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let events = store.read(&query, ReadOptions::forward()).await.unwrap();
    assert_eq!(events.len(), workers * increments);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.data()["seen"].as_u64(), Some(i as u64));
    }
}

fn arb_event() -> impl Strategy<Value = Event> {
    ("[ab]", proptest::collection::btree_set("t[12]", 0..3))
        .prop_map(|(t, tags)| Event::new(t, serde_json::Value::Null).with_tags(tags))
}

fn arb_query() -> impl Strategy<Value = Query> {
    let item = (
        proptest::option::of(proptest::collection::btree_set("[ab]", 1..3)),
        proptest::option::of(proptest::collection::btree_set("t[12]", 1..3)),
    )
        .prop_map(|(types, tags)| QueryItem { types, tags });
    proptest::collection::vec(item, 0..3).prop_map(Query::from_items)
}

proptest! {
    #[test]
    fn append_succeeds_iff_no_match_after_boundary(
        log in proptest::collection::vec(arb_event(), 0..12),
        query in arb_query(),
        after in proptest::option::of(0u64..14),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let store = InMemoryEventStore::new();
            for event in &log {
                store.append_event(event.clone(), None).await.unwrap();
            }

            let boundary = after.unwrap_or(0);
            let conflicting = store
                .read_all()
                .await
                .unwrap()
                .iter()
                .any(|e| e.position.as_u64() > boundary && query.matches(&e.event));

            let mut condition = AppendCondition::fail_if_events_match(query.clone());
            if let Some(after) = after {
                condition = condition.after(Position::new(after));
            }
            let result = store
                .append_event(Event::new("c", serde_json::Value::Null), Some(condition))
                .await;

            prop_assert_eq!(result.is_ok(), !conflicting);
            let expected_len = log.len() + usize::from(!conflicting);
            prop_assert_eq!(store.event_count().await, expected_len);
            Ok(())
        })?;
    }

    #[test]
    fn positions_are_gapless_from_one(batches in proptest::collection::vec(1usize..4, 1..10)) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let store = InMemoryEventStore::new();
            for size in &batches {
                let batch = (0..*size).map(|_| Event::new("a", serde_json::Value::Null)).collect();
                store.append(batch, None).await.unwrap();
            }
            let total: usize = batches.iter().sum();
            let expected: Vec<_> = (1..=total as u64).map(Position::new).collect();
            prop_assert_eq!(store.read_all().await.unwrap().positions(), expected);

            let last = store.read(&Query::all(), ReadOptions::last()).await.unwrap();
            prop_assert_eq!(last.len(), 1);
            prop_assert_eq!(last.first().map(|e| e.position), Some(Position::new(total as u64)));
            Ok(())
        })?;
    }
}
