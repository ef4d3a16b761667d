//! Projection implementations (read model builders).
//!
//! Every projection is rebuildable from the event log and idempotent under
//! at-least-once delivery.

pub mod cursor;
pub mod ledger;
pub mod orders;
pub mod parties;
pub mod products;
pub mod stock;

pub use cursor::{Projection, ProjectionError, StreamCursors};
pub use ledger::LedgerProjection;
pub use orders::{OrderReadModel, OrdersProjection};
pub use parties::{PartyDirectoryProjection, PartyReadModel};
pub use products::{ProductCatalogProjection, ProductReadModel};
pub use stock::{StockLevelReadModel, StockLevelsProjection};

/// Aggregate type names used as stream discriminators.
pub mod aggregate_types {
    pub const PRODUCT: &str = "products.product";
    pub const STOCK_ITEM: &str = "inventory.item";
    pub const PARTY: &str = "parties.party";
    pub const ORDER: &str = "sales.order";
    pub const TRANSACTION: &str = "ledger.transaction";
}
