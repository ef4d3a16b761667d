use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use stockbook_auth::UserAccount;
use stockbook_core::{DomainResult, Money};
use stockbook_infra::projections::{OrderReadModel, PartyReadModel, ProductReadModel, StockLevelReadModel};
use stockbook_inventory::{StockLine, StockSummary};
use stockbook_ledger::{RunningBalancePoint, Transaction};
use stockbook_products::{ProductDetails, ProductId};
use stockbook_sales::{MonthlySales, OrderStatus};
use stockbook_parties::PartyId;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    #[serde(flatten)]
    pub details: ProductDetails,
    /// Opening stock; defaults to 0.
    #[serde(default)]
    pub quantity: Option<i64>,
    /// Reorder level; defaults to the configured low-stock default.
    #[serde(default)]
    pub min_quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderLevelRequest {
    pub min_quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Defaults to the product's current price.
    #[serde(default)]
    pub unit_price: Option<Money>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: PartyId,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceItemsRequest {
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// -------------------------
// Response mapping
// -------------------------

fn money(m: Money) -> String {
    m.to_display_string()
}

pub fn list(items: Vec<JsonValue>) -> JsonValue {
    json!({ "items": items })
}

pub fn product_to_json(rm: ProductReadModel) -> JsonValue {
    json!({
        "id": rm.product_id.to_string(),
        "sku": rm.sku,
        "name": rm.name,
        "description": rm.description,
        "price": money(rm.price),
        "image_url": rm.image_url,
        "created_at": rm.created_at,
        "updated_at": rm.updated_at,
    })
}

/// The stock line behind an inventory row.
pub fn stock_line(product: &ProductReadModel, stock: &StockLevelReadModel) -> StockLine {
    StockLine {
        quantity: stock.quantity,
        min_quantity: stock.min_quantity,
        unit_price: product.price,
    }
}

pub fn inventory_row_to_json(product: &ProductReadModel, stock: &StockLevelReadModel) -> DomainResult<JsonValue> {
    let line = stock_line(product, stock);
    Ok(json!({
        "product_id": product.product_id.to_string(),
        "name": product.name,
        "sku": product.sku,
        "quantity": stock.quantity,
        "min_quantity": stock.min_quantity,
        "unit_price": money(product.price),
        "value": money(line.value()?),
        "low_stock": line.is_low_stock(),
    }))
}

pub fn stock_summary_to_json(summary: StockSummary) -> JsonValue {
    json!({
        "item_count": summary.item_count,
        "low_stock_count": summary.low_stock_count,
        "total_value": money(summary.total_value),
    })
}

pub fn party_to_json(rm: PartyReadModel) -> JsonValue {
    let mut v = json!({
        "id": rm.party_id.to_string(),
        "kind": rm.kind.as_str(),
        "name": rm.name,
        "document": rm.document,
        "email": rm.email,
        "phone": rm.phone,
        "address": rm.address,
        "created_at": rm.created_at,
    });
    if let Some(t) = rm.customer_type {
        v["customer_type"] = json!(t);
    }
    v
}

pub fn order_to_json(rm: OrderReadModel, customer_name: Option<String>) -> DomainResult<JsonValue> {
    let items = rm
        .items
        .iter()
        .map(|item| {
            Ok(json!({
                "product_id": item.product_id.to_string(),
                "quantity": item.quantity,
                "unit_price": money(item.unit_price),
                "subtotal": money(item.subtotal()?),
            }))
        })
        .collect::<DomainResult<Vec<_>>>()?;

    Ok(json!({
        "id": rm.order_id.to_string(),
        "customer_id": rm.customer_id.to_string(),
        "customer_name": customer_name,
        "status": rm.status.as_str(),
        "placed_on": rm.placed_on,
        "items": items,
        "total": money(rm.total),
    }))
}

pub fn transaction_to_json(t: Transaction) -> JsonValue {
    json!({
        "id": t.id.to_string(),
        "date": t.date,
        "kind": t.kind,
        "amount": money(t.amount),
        "product_id": t.product_id.to_string(),
        "order_id": t.order_id.map(|id| id.to_string()),
        "description": t.description,
    })
}

pub fn balance_to_json(series: Vec<RunningBalancePoint>) -> JsonValue {
    let points = series
        .into_iter()
        .map(|p| json!({ "date": p.date, "balance": money(p.balance) }))
        .collect();
    list(points)
}

pub fn monthly_sales_to_json(months: Vec<MonthlySales>) -> JsonValue {
    let months = months
        .into_iter()
        .map(|m| json!({ "name": m.name, "total": money(m.total) }))
        .collect();
    list(months)
}

pub fn user_to_json(account: &UserAccount) -> JsonValue {
    json!({
        "id": account.id.to_string(),
        "email": account.email,
        "name": account.name,
        "role": account.role.as_str(),
        "created_at": account.created_at,
    })
}
