use serde::Serialize;
use serde_json::Value as JsonValue;

use stockbook_events::EventEnvelope;
use stockbook_inventory::{InventoryEvent, is_low_stock};
use stockbook_products::ProductId;

use crate::projections::aggregate_types;
use crate::projections::cursor::{Projection, ProjectionError, StreamCursors, decode, ensure_stream};
use crate::read_model::ReadModelStore;

/// Current stock level of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockLevelReadModel {
    pub product_id: ProductId,
    pub quantity: i64,
    pub min_quantity: i64,
}

impl StockLevelReadModel {
    pub fn is_low_stock(&self) -> bool {
        is_low_stock(self.quantity, self.min_quantity)
    }
}

#[derive(Debug)]
pub struct StockLevelsProjection<S>
where
    S: ReadModelStore<ProductId, StockLevelReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> StockLevelsProjection<S>
where
    S: ReadModelStore<ProductId, StockLevelReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, product_id: &ProductId) -> Option<StockLevelReadModel> {
        self.store.get(product_id)
    }

    pub fn list(&self) -> Vec<StockLevelReadModel> {
        self.store.list()
    }

    pub fn low_stock(&self) -> Vec<StockLevelReadModel> {
        self.store.list().into_iter().filter(|s| s.is_low_stock()).collect()
    }
}

impl<S> Projection for StockLevelsProjection<S>
where
    S: ReadModelStore<ProductId, StockLevelReadModel>,
{
    fn name(&self) -> &'static str {
        "inventory.stock_levels"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::STOCK_ITEM {
            return Ok(());
        }
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let ev: InventoryEvent = decode(envelope)?;
        let item_id = match &ev {
            InventoryEvent::ItemOpened(e) => e.item_id,
            InventoryEvent::StockAdjusted(e) => e.item_id,
            InventoryEvent::ReorderLevelSet(e) => e.item_id,
            InventoryEvent::ItemClosed(e) => e.item_id,
        };
        ensure_stream(envelope, item_id.0)?;

        let current = || {
            self.store.get(&item_id).unwrap_or(StockLevelReadModel {
                product_id: item_id,
                quantity: 0,
                min_quantity: 0,
            })
        };

        match ev {
            InventoryEvent::ItemOpened(e) => {
                self.store.upsert(
                    item_id,
                    StockLevelReadModel {
                        product_id: item_id,
                        quantity: e.opening_quantity,
                        min_quantity: e.min_quantity,
                    },
                );
            }
            InventoryEvent::StockAdjusted(e) => {
                let mut rm = current();
                rm.quantity = e.new_quantity;
                self.store.upsert(item_id, rm);
            }
            InventoryEvent::ReorderLevelSet(e) => {
                let mut rm = current();
                rm.min_quantity = e.min_quantity;
                self.store.upsert(item_id, rm);
            }
            InventoryEvent::ItemClosed(_) => {
                self.store.remove(&item_id);
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
