//! Integration tests for cart decisions.
//!
//! These tests verify decision models built from composite projections,
//! stale-decision detection under concurrency, and the scenario runner.

use std::sync::Arc;

use decision::{
    AddItem, CartCommand, CartError, CartId, CartService, CloseCart, DecisionError, Scenario,
    build_decision_model, run_scenarios,
};
use event_store::{
    Event, EventStore, EventStoreExt, InMemoryEventStore, Position, Query, QueryItem,
};
use projections::{CompositeProjection, TaggedProjection};
use serde_json::json;

mod decision_models {
    use super::*;

    #[tokio::test]
    async fn composite_model_over_item_and_close_events() {
        let store = InMemoryEventStore::new();
        store
            .append(
                vec![
                    Event::new("ItemAdded", json!({ "productId": "p9" })).with_tag("cart-2"),
                    Event::new("ItemAdded", json!({ "productId": "p1" })).with_tag("cart-1"),
                    Event::new("ItemAdded", json!({ "productId": "p2" })).with_tag("cart-1"),
                    Event::new("CartClosed", json!({})),
                ],
                None,
            )
            .await
            .unwrap();

        let projections = CompositeProjection::new()
            .with(
                "count",
                TaggedProjection::builder(0u32)
                    .on("ItemAdded", |count: &u32, _| count + 1)
                    .tag_filter(["cart-1"])
                    .build(),
            )
            .with(
                "closed",
                TaggedProjection::builder(false)
                    .on("CartClosed", |_: &bool, _| true)
                    .build(),
            );

        let model = build_decision_model(&store, &projections).await.unwrap();

        assert_eq!(model.state.get::<u32>("count"), Some(&2));
        assert_eq!(model.state.get::<bool>("closed"), Some(&true));
        assert_eq!(model.append_condition.after, Some(Position::new(4)));
        assert_eq!(
            model.append_condition.fail_if_events_match,
            Query::from(QueryItem::for_types(["ItemAdded"]).tags(["cart-1"]))
                .merge(&Query::for_types(["CartClosed"]))
        );
    }

    #[tokio::test]
    async fn unrelated_events_do_not_invalidate_decision() {
        let store = InMemoryEventStore::new();
        let service = CartService::new(store.clone());
        let cart_id = CartId::new();
        service.add_item(AddItem::new(cart_id, "p1")).await.unwrap();

        let model = build_decision_model(&store, &decision::cart::cart_projections(cart_id))
            .await
            .unwrap();

        // Another cart moves on in between.
        service.add_item(AddItem::new(CartId::new(), "p1")).await.unwrap();

        let outcome = store
            .try_append(
                vec![Event::new("ItemAdded", json!({})).with_tag(cart_id.tag())],
                Some(model.append_condition),
            )
            .await
            .unwrap();
        assert!(!outcome.append_condition_failed);
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_never_overfill_cart() {
        let store = InMemoryEventStore::new();
        let service = Arc::new(CartService::new(store.clone()));
        let cart_id = CartId::new();

        let tasks: Vec<_> = (0..12)
            .map(|i| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    service
                        .add_item(AddItem::new(cart_id, format!("p{i}")))
                        .await
                })
            })
            .collect();

        let mut succeeded = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(e) if e.is_conflict() => {}
                Err(DecisionError::Cart(CartError::Full { .. })) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        let added = store
            .read(&Query::for_tags([cart_id.tag()]), Default::default())
            .await
            .unwrap()
            .len();
        assert!(succeeded >= 1);
        assert!(added <= 3);
        assert_eq!(added, succeeded);
    }

    #[tokio::test]
    async fn stale_decision_fails_with_condition_message() {
        let store = InMemoryEventStore::new();
        let service = CartService::new(store.clone());
        let cart_id = CartId::new();
        service.add_item(AddItem::new(cart_id, "p1")).await.unwrap();

        let model = build_decision_model(&store, &decision::cart::cart_projections(cart_id))
            .await
            .unwrap();
        service.close_cart(CloseCart::new(cart_id)).await.unwrap();

        let err = store
            .append(
                vec![Event::new("ItemAdded", json!({})).with_tag(cart_id.tag())],
                Some(model.append_condition),
            )
            .await
            .unwrap_err();
        let err = DecisionError::from(err);

        assert!(err.is_conflict());
        assert_eq!(
            err.to_string(),
            "The Event Store contained events matching the specified query after position 1"
        );
    }
}

mod scenarios {
    use super::*;

    fn item_added(cart_id: CartId, product_id: &str) -> Event {
        Event::new(
            "ItemAdded",
            json!({ "cartId": cart_id, "productId": product_id }),
        )
        .with_tag(cart_id.tag())
    }

    fn cart_closed(cart_id: CartId) -> Event {
        Event::new("CartClosed", json!({ "cartId": cart_id })).with_tag(cart_id.tag())
    }

    #[tokio::test]
    async fn cart_rules_hold() {
        let store = InMemoryEventStore::new();
        let service = CartService::new(store.clone());
        let cart_id = CartId::new();

        let scenarios = vec![
            Scenario::<CartCommand>::new("add to empty cart", AddItem::new(cart_id, "p1"))
                .then_event(item_added(cart_id, "p1")),
            Scenario::new("add to full cart", AddItem::new(cart_id, "p4"))
                .given([
                    item_added(cart_id, "p1"),
                    item_added(cart_id, "p2"),
                    item_added(cart_id, "p3"),
                ])
                .then_error("Cart cannot have more than 3 items"),
            Scenario::new("add to closed cart", AddItem::new(cart_id, "p1"))
                .given([cart_closed(cart_id)])
                .then_error("Cart is closed"),
            Scenario::new("close open cart", CloseCart::new(cart_id))
                .given([item_added(cart_id, "p1")])
                .then_event(Event::new("CartClosed", json!({ "cartId": cart_id }))),
            Scenario::new("close closed cart", CloseCart::new(cart_id))
                .given([cart_closed(cart_id)])
                .then_error("Cart is already closed"),
        ];

        let reports = run_scenarios(&store, &service, scenarios).await.unwrap();

        assert_eq!(reports.len(), 5);
        for report in &reports {
            assert!(report.passed, "{}: {:?}", report.description, report.message);
        }
    }

    #[tokio::test]
    async fn mismatches_are_reported() {
        let store = InMemoryEventStore::new();
        let service = CartService::new(store.clone());
        let cart_id = CartId::new();

        let scenarios = vec![
            Scenario::<CartCommand>::new("wrong event", AddItem::new(cart_id, "p1"))
                .then_event(item_added(cart_id, "p2")),
            Scenario::new("missing error", AddItem::new(cart_id, "p1"))
                .then_error("Cart is closed"),
            Scenario::new("unexpected error", CloseCart::new(cart_id))
                .given([cart_closed(cart_id)]),
            Scenario::new("different error", CloseCart::new(cart_id))
                .given([cart_closed(cart_id)])
                .then_error("Cart is closed"),
        ];

        let reports = run_scenarios(&store, &service, scenarios).await.unwrap();

        assert!(reports.iter().all(|r| !r.passed));
        assert_eq!(
            reports[1].message.as_deref(),
            Some("expected error 'Cart is closed' but none was thrown")
        );
        assert_eq!(
            reports[2].message.as_deref(),
            Some("expected no error, but got 'Cart is already closed'")
        );
        assert_eq!(
            reports[3].message.as_deref(),
            Some("expected error 'Cart is closed' but got 'Cart is already closed'")
        );
    }

    #[tokio::test]
    async fn store_is_reset_between_scenarios() {
        let store = InMemoryEventStore::new();
        let service = CartService::new(store.clone());
        let cart_id = CartId::new();

        let scenarios = vec![
            Scenario::<CartCommand>::new("close", CloseCart::new(cart_id)),
            Scenario::new("close again in a fresh store", CloseCart::new(cart_id)),
        ];

        let reports = run_scenarios(&store, &service, scenarios).await.unwrap();
        assert!(reports.iter().all(|r| r.passed));
        assert_eq!(store.event_count().await, 1);
    }
}
