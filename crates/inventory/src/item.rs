use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{Aggregate, AggregateRoot, DomainError};
use stockbook_events::Event;
use stockbook_products::ProductId;

/// Aggregate root: the stock item of one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockItem {
    id: ProductId,
    quantity: i64,
    min_quantity: i64,
    version: u64,
    opened: bool,
    closed: bool,
}

impl StockItem {
    /// Create an empty, not-yet-opened aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            quantity: 0,
            min_quantity: 0,
            version: 0,
            opened: false,
            closed: false,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn min_quantity(&self) -> i64 {
        self.min_quantity
    }

    pub fn is_low_stock(&self) -> bool {
        crate::valuation::is_low_stock(self.quantity, self.min_quantity)
    }
}

impl AggregateRoot for StockItem {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenItem {
    pub item_id: ProductId,
    pub opening_quantity: i64,
    pub min_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock. Positive deltas receive stock, negative ones issue it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub item_id: ProductId,
    pub delta: i64,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetReorderLevel {
    pub item_id: ProductId,
    pub min_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseItem {
    pub item_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    OpenItem(OpenItem),
    AdjustStock(AdjustStock),
    SetReorderLevel(SetReorderLevel),
    CloseItem(CloseItem),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOpened {
    pub item_id: ProductId,
    pub opening_quantity: i64,
    pub min_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub item_id: ProductId,
    pub delta: i64,
    /// Quantity after the adjustment.
    pub new_quantity: i64,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderLevelSet {
    pub item_id: ProductId,
    pub min_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemClosed {
    pub item_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    ItemOpened(ItemOpened),
    StockAdjusted(StockAdjusted),
    ReorderLevelSet(ReorderLevelSet),
    ItemClosed(ItemClosed),
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::ItemOpened(_) => "inventory.item.opened",
            InventoryEvent::StockAdjusted(_) => "inventory.item.stock_adjusted",
            InventoryEvent::ReorderLevelSet(_) => "inventory.item.reorder_level_set",
            InventoryEvent::ItemClosed(_) => "inventory.item.closed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::ItemOpened(e) => e.occurred_at,
            InventoryEvent::StockAdjusted(e) => e.occurred_at,
            InventoryEvent::ReorderLevelSet(e) => e.occurred_at,
            InventoryEvent::ItemClosed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockItem {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::ItemOpened(e) => {
                self.id = e.item_id;
                self.quantity = e.opening_quantity;
                self.min_quantity = e.min_quantity;
                self.opened = true;
            }
            InventoryEvent::StockAdjusted(e) => {
                self.quantity = e.new_quantity;
            }
            InventoryEvent::ReorderLevelSet(e) => {
                self.min_quantity = e.min_quantity;
            }
            InventoryEvent::ItemClosed(_) => {
                self.closed = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::OpenItem(cmd) => self.handle_open(cmd),
            InventoryCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
            InventoryCommand::SetReorderLevel(cmd) => self.handle_reorder_level(cmd),
            InventoryCommand::CloseItem(cmd) => self.handle_close(cmd),
        }
    }
}

impl StockItem {
    fn ensure_open(&self, item_id: ProductId) -> Result<(), DomainError> {
        if !self.opened || self.closed {
            return Err(DomainError::not_found());
        }
        if self.id != item_id {
            return Err(DomainError::invariant("item_id mismatch"));
        }
        Ok(())
    }

    fn ensure_min_quantity(min_quantity: i64) -> Result<(), DomainError> {
        if min_quantity < 0 {
            return Err(DomainError::validation("min_quantity cannot be negative"));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenItem) -> Result<Vec<InventoryEvent>, DomainError> {
        if self.closed {
            return Err(DomainError::not_found());
        }
        if self.opened {
            return Err(DomainError::conflict("stock item already exists"));
        }
        if cmd.opening_quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        Self::ensure_min_quantity(cmd.min_quantity)?;

        Ok(vec![InventoryEvent::ItemOpened(ItemOpened {
            item_id: cmd.item_id,
            opening_quantity: cmd.opening_quantity,
            min_quantity: cmd.min_quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_open(cmd.item_id)?;

        if cmd.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }

        let new_quantity = self
            .quantity
            .checked_add(cmd.delta)
            .ok_or_else(|| DomainError::invariant("stock quantity out of range"))?;
        if new_quantity < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }

        Ok(vec![InventoryEvent::StockAdjusted(StockAdjusted {
            item_id: cmd.item_id,
            delta: cmd.delta,
            new_quantity,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reorder_level(
        &self,
        cmd: &SetReorderLevel,
    ) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_open(cmd.item_id)?;
        Self::ensure_min_quantity(cmd.min_quantity)?;

        Ok(vec![InventoryEvent::ReorderLevelSet(ReorderLevelSet {
            item_id: cmd.item_id,
            min_quantity: cmd.min_quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_close(&self, cmd: &CloseItem) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_open(cmd.item_id)?;

        Ok(vec![InventoryEvent::ItemClosed(ItemClosed {
            item_id: cmd.item_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
