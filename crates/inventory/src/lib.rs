//! Inventory domain module (event-sourced).
//!
//! One stock item per product, keyed by the product id, plus pure valuation
//! helpers used by the inventory screens and the dashboard.

pub mod item;
pub mod valuation;

pub use item::{
    AdjustStock, CloseItem, InventoryCommand, InventoryEvent, ItemClosed, ItemOpened, OpenItem,
    ReorderLevelSet, SetReorderLevel, StockAdjusted, StockItem,
};
pub use valuation::{StockLine, StockSummary, is_low_stock, stock_value, summarize};
