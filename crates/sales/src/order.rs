use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money};
use stockbook_events::Event;
use stockbook_parties::PartyId;

use crate::total::{LineItem, order_total};

/// Order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Order status lifecycle.
///
/// ```text
/// pending ──► processing ──► completed
///    │            │
///    ├────────────┴────────► cancelled
///    └─────────────────────► completed
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Items may be replaced only while the order is still open.
    pub fn allows_item_changes(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }

    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Pending, Processing | Completed | Cancelled) | (Processing, Completed | Cancelled)
        )
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    customer_id: Option<PartyId>,
    status: OrderStatus,
    items: Vec<LineItem>,
    total: Money,
    placed_on: Option<NaiveDate>,
    deleted: bool,
    version: u64,
}

impl Order {
    /// Create an empty, not-yet-placed aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            customer_id: None,
            status: OrderStatus::Pending,
            items: Vec::new(),
            total: Money::zero(),
            placed_on: None,
            deleted: false,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn customer_id(&self) -> Option<PartyId> {
        self.customer_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn placed_on(&self) -> Option<NaiveDate> {
        self.placed_on
    }

    /// Placed and not deleted.
    pub fn is_live(&self) -> bool {
        self.customer_id.is_some() && !self.deleted
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder. Totals are always derived from `items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub customer_id: PartyId,
    pub items: Vec<LineItem>,
    pub placed_on: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReplaceItems. Edits replace the whole item list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceItems {
    pub order_id: OrderId,
    pub items: Vec<LineItem>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    ReplaceItems(ReplaceItems),
    ChangeStatus(ChangeStatus),
    DeleteOrder(DeleteOrder),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub customer_id: PartyId,
    pub items: Vec<LineItem>,
    pub total: Money,
    pub placed_on: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsReplaced {
    pub order_id: OrderId,
    pub items: Vec<LineItem>,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDeleted {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    ItemsReplaced(ItemsReplaced),
    OrderStatusChanged(OrderStatusChanged),
    OrderDeleted(OrderDeleted),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "sales.order.placed",
            OrderEvent::ItemsReplaced(_) => "sales.order.items_replaced",
            OrderEvent::OrderStatusChanged(_) => "sales.order.status_changed",
            OrderEvent::OrderDeleted(_) => "sales.order.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::ItemsReplaced(e) => e.occurred_at,
            OrderEvent::OrderStatusChanged(e) => e.occurred_at,
            OrderEvent::OrderDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.customer_id = Some(e.customer_id);
                self.status = OrderStatus::Pending;
                self.items = e.items.clone();
                self.total = e.total;
                self.placed_on = Some(e.placed_on);
            }
            OrderEvent::ItemsReplaced(e) => {
                self.items = e.items.clone();
                self.total = e.total;
            }
            OrderEvent::OrderStatusChanged(e) => {
                self.status = e.to;
            }
            OrderEvent::OrderDeleted(_) => {
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::ReplaceItems(cmd) => self.handle_replace(cmd),
            OrderCommand::ChangeStatus(cmd) => self.handle_status(cmd),
            OrderCommand::DeleteOrder(cmd) => self.handle_delete(cmd),
        }
    }
}

fn validate_items(items: &[LineItem]) -> Result<(), DomainError> {
    for (i, item) in items.iter().enumerate() {
        if item.quantity < 1 {
            return Err(DomainError::validation(format!(
                "items[{i}].quantity must be at least 1"
            )));
        }
        if item.unit_price.is_negative() {
            return Err(DomainError::validation(format!(
                "items[{i}].unit_price cannot be negative"
            )));
        }
    }
    Ok(())
}

impl Order {
    fn ensure_live(&self, order_id: OrderId) -> Result<(), DomainError> {
        if !self.is_live() {
            return Err(DomainError::not_found());
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.customer_id.is_some() {
            return Err(DomainError::conflict("order already exists"));
        }
        validate_items(&cmd.items)?;
        let total = order_total(&cmd.items)?;

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            customer_id: cmd.customer_id,
            items: cmd.items.clone(),
            total,
            placed_on: cmd.placed_on,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_replace(&self, cmd: &ReplaceItems) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_live(cmd.order_id)?;
        if !self.status.allows_item_changes() {
            return Err(DomainError::invariant(format!(
                "items of a {} order cannot be changed",
                self.status
            )));
        }
        validate_items(&cmd.items)?;
        let total = order_total(&cmd.items)?;

        Ok(vec![OrderEvent::ItemsReplaced(ItemsReplaced {
            order_id: cmd.order_id,
            items: cmd.items.clone(),
            total,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_status(&self, cmd: &ChangeStatus) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_live(cmd.order_id)?;
        let (from, to) = (self.status, cmd.status);

        if from == to {
            return Err(DomainError::invariant(format!("order is already {to}")));
        }
        if !from.can_transition_to(to) {
            return Err(DomainError::invariant(format!(
                "cannot move order from {from} to {to}"
            )));
        }
        if self.items.is_empty() && to != OrderStatus::Cancelled {
            return Err(DomainError::invariant(
                "an order without items can only be cancelled",
            ));
        }

        Ok(vec![OrderEvent::OrderStatusChanged(OrderStatusChanged {
            order_id: cmd.order_id,
            from,
            to,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_live(cmd.order_id)?;

        Ok(vec![OrderEvent::OrderDeleted(OrderDeleted {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
