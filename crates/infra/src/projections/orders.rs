use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value as JsonValue;

use stockbook_core::{DomainError, DomainResult, Money};
use stockbook_events::EventEnvelope;
use stockbook_parties::PartyId;
use stockbook_sales::{LineItem, MonthlySales, OrderEvent, OrderId, OrderStatus, monthly_sales};

use crate::projections::aggregate_types;
use crate::projections::cursor::{Projection, ProjectionError, StreamCursors, decode, ensure_stream};
use crate::read_model::ReadModelStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderReadModel {
    pub order_id: OrderId,
    pub customer_id: PartyId,
    pub status: OrderStatus,
    pub items: Vec<LineItem>,
    /// Copied from the latest event; computed by the aggregate from `items`.
    pub total: Money,
    pub placed_on: NaiveDate,
}

#[derive(Debug)]
pub struct OrdersProjection<S>
where
    S: ReadModelStore<OrderId, OrderReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> OrdersProjection<S>
where
    S: ReadModelStore<OrderId, OrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<OrderReadModel> {
        self.store.get(order_id)
    }

    pub fn list(&self) -> Vec<OrderReadModel> {
        self.store.list()
    }

    /// Orders that count towards revenue.
    pub fn billable(&self) -> Vec<OrderReadModel> {
        self.store
            .list()
            .into_iter()
            .filter(|o| o.status != OrderStatus::Cancelled)
            .collect()
    }

    pub fn revenue(&self) -> DomainResult<Money> {
        Money::try_sum(self.billable().iter().map(|o| o.total))
            .ok_or_else(|| DomainError::invalid_input("revenue out of range"))
    }

    pub fn monthly_sales(&self) -> DomainResult<Vec<MonthlySales>> {
        monthly_sales(self.billable().iter().map(|o| (o.placed_on, o.total)))
    }
}

impl<S> Projection for OrdersProjection<S>
where
    S: ReadModelStore<OrderId, OrderReadModel>,
{
    fn name(&self) -> &'static str {
        "sales.orders"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::ORDER {
            return Ok(());
        }
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let ev: OrderEvent = decode(envelope)?;
        let order_id = match &ev {
            OrderEvent::OrderPlaced(e) => e.order_id,
            OrderEvent::ItemsReplaced(e) => e.order_id,
            OrderEvent::OrderStatusChanged(e) => e.order_id,
            OrderEvent::OrderDeleted(e) => e.order_id,
        };
        ensure_stream(envelope, order_id.0)?;

        match ev {
            OrderEvent::OrderPlaced(e) => {
                self.store.upsert(
                    order_id,
                    OrderReadModel {
                        order_id,
                        customer_id: e.customer_id,
                        status: OrderStatus::Pending,
                        items: e.items,
                        total: e.total,
                        placed_on: e.placed_on,
                    },
                );
            }
            OrderEvent::ItemsReplaced(e) => {
                if let Some(mut rm) = self.store.get(&order_id) {
                    rm.items = e.items;
                    rm.total = e.total;
                    self.store.upsert(order_id, rm);
                }
            }
            OrderEvent::OrderStatusChanged(e) => {
                if let Some(mut rm) = self.store.get(&order_id) {
                    rm.status = e.to;
                    self.store.upsert(order_id, rm);
                }
            }
            OrderEvent::OrderDeleted(_) => {
                self.store.remove(&order_id);
            }
        }

        self.cursors.advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use stockbook_core::AggregateId;
    use stockbook_products::ProductId;
    use stockbook_sales::{OrderPlaced, OrderStatusChanged, order_total};
    use uuid::Uuid;

    use crate::read_model::InMemoryReadModelStore;

    fn envelope(id: OrderId, seq: u64, ev: OrderEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            id.0,
            aggregate_types::ORDER,
            seq,
            serde_json::to_value(ev).unwrap(),
        )
    }

    fn placed(id: OrderId, placed_on: &str, price: Money) -> EventEnvelope<JsonValue> {
        let items = vec![LineItem {
            product_id: ProductId::new(AggregateId::new()),
            quantity: 2,
            unit_price: price,
        }];
        let total = order_total(&items).unwrap();
        envelope(
            id,
            1,
            OrderEvent::OrderPlaced(OrderPlaced {
                order_id: id,
                customer_id: PartyId::new(AggregateId::new()),
                items,
                total,
                placed_on: NaiveDate::parse_from_str(placed_on, "%Y-%m-%d").unwrap(),
                occurred_at: Utc::now(),
            }),
        )
    }

    #[test]
    fn cancelled_orders_do_not_count_as_revenue() {
        let p = OrdersProjection::new(InMemoryReadModelStore::new());
        let kept = OrderId::new(AggregateId::new());
        let cancelled = OrderId::new(AggregateId::new());

        p.apply_envelope(&placed(kept, "2024-01-10", Money::new(dec!(10.00)))).unwrap();
        p.apply_envelope(&placed(cancelled, "2024-02-10", Money::new(dec!(99.00)))).unwrap();
        p.apply_envelope(&envelope(
            cancelled,
            2,
            OrderEvent::OrderStatusChanged(OrderStatusChanged {
                order_id: cancelled,
                from: OrderStatus::Pending,
                to: OrderStatus::Cancelled,
                occurred_at: Utc::now(),
            }),
        ))
        .unwrap();

        assert_eq!(p.list().len(), 2);
        assert_eq!(p.revenue().unwrap(), Money::new(dec!(20.00)));

        let months = p.monthly_sales().unwrap();
        assert_eq!(months.len(), 1);
        assert_eq!(months[0].name, "2024-01");
    }
}
