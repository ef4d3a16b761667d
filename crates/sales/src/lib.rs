//! Sales domain module: orders, line-item totals and the monthly overview.

pub mod order;
pub mod overview;
pub mod total;

pub use order::{
    ChangeStatus, DeleteOrder, ItemsReplaced, Order, OrderCommand, OrderDeleted, OrderEvent,
    OrderId, OrderPlaced, OrderStatus, OrderStatusChanged, PlaceOrder, ReplaceItems,
};
pub use overview::{MonthlySales, monthly_sales};
pub use total::{LineItem, order_total};
