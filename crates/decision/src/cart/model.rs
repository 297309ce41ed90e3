//! Projections a cart decision is made from.

use projections::{CompositeProjection, TaggedProjection};

use super::CartId;

/// Number of items added to the cart.
pub fn item_count(cart_id: CartId) -> TaggedProjection<u32> {
    TaggedProjection::builder(0u32)
        .on("ItemAdded", |count: &u32, _| count + 1)
        .tag_filter([cart_id.tag()])
        .build()
}

/// Whether the cart has been closed.
pub fn cart_closed(cart_id: CartId) -> TaggedProjection<bool> {
    TaggedProjection::builder(false)
        .on("CartClosed", |_: &bool, _| true)
        .tag_filter([cart_id.tag()])
        .build()
}

/// Both cart projections, named `itemCount` and `cartClosed`.
pub fn cart_projections(cart_id: CartId) -> CompositeProjection {
    CompositeProjection::new()
        .with("itemCount", item_count(cart_id))
        .with("cartClosed", cart_closed(cart_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::{Event, Position, SequencedEvent};
    use projections::Projection;

    fn sequenced(event_type: &str, cart_id: CartId, position: u64) -> SequencedEvent {
        SequencedEvent::new(
            Event::new(event_type, serde_json::json!({})).with_tag(cart_id.tag()),
            Position::new(position),
        )
    }

    #[test]
    fn test_item_count_ignores_other_carts() {
        let mine = CartId::new();
        let other = CartId::new();
        let events = [
            sequenced("ItemAdded", mine, 1),
            sequenced("ItemAdded", other, 2),
            sequenced("ItemAdded", mine, 3),
        ];

        assert_eq!(item_count(mine).fold(&events), 2);
    }

    #[test]
    fn test_composite_query_is_scoped_to_cart() {
        let cart_id = CartId::new();
        let projections = cart_projections(cart_id);

        assert!(projections.query().matches(&sequenced("CartClosed", cart_id, 1).event));
        assert!(!projections.query().matches(&sequenced("CartClosed", CartId::new(), 1).event));
        assert!(!projections.query().matches(&sequenced("Other", cart_id, 1).event));
    }
}
