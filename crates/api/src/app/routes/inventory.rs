use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::Utc;
use serde_json::json;

use stockbook_core::AggregateId;
use stockbook_infra::projections::{ProductReadModel, StockLevelReadModel, aggregate_types};
use stockbook_inventory::{AdjustStock, InventoryCommand, SetReorderLevel, StockItem, summarize};
use stockbook_products::ProductId;

use crate::app::dto;
use crate::app::errors::{ApiError, parse_id};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_inventory))
        .route("/summary", get(inventory_summary))
        .route("/:id/adjust", post(adjust_stock))
        .route("/:id/reorder-level", put(set_reorder_level))
}

fn make_stock_item(id: AggregateId) -> StockItem {
    StockItem::empty(ProductId::new(id))
}

/// Products that have an open stock item, in catalog order.
fn rows(services: &AppServices) -> Vec<(ProductReadModel, StockLevelReadModel)> {
    services
        .products
        .list()
        .into_iter()
        .filter_map(|product| {
            let stock = services.stock.get(&product.product_id)?;
            Some((product, stock))
        })
        .collect()
}

pub async fn list_inventory(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Response, ApiError> {
    let items = rows(&services)
        .iter()
        .map(|(product, stock)| dto::inventory_row_to_json(product, stock))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(dto::list(items)).into_response())
}

pub async fn inventory_summary(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Response, ApiError> {
    let lines: Vec<_> = rows(&services)
        .iter()
        .map(|(product, stock)| dto::stock_line(product, stock))
        .collect();
    let summary = summarize(&lines)?;
    Ok(Json(dto::stock_summary_to_json(summary)).into_response())
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::AdjustStockRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let agg = parse_id(&id)?;
    let Json(body) = body?;

    let committed = services.dispatch(
        agg,
        aggregate_types::STOCK_ITEM,
        InventoryCommand::AdjustStock(AdjustStock {
            item_id: ProductId::new(agg),
            delta: body.delta,
            reason: body.reason,
            occurred_at: Utc::now(),
        }),
        make_stock_item,
    )?;

    Ok(Json(json!({
        "id": agg.to_string(),
        "stream_version": committed.last().map(|e| e.sequence_number).unwrap_or(0),
    }))
    .into_response())
}

pub async fn set_reorder_level(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::ReorderLevelRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let agg = parse_id(&id)?;
    let Json(body) = body?;

    let committed = services.dispatch(
        agg,
        aggregate_types::STOCK_ITEM,
        InventoryCommand::SetReorderLevel(SetReorderLevel {
            item_id: ProductId::new(agg),
            min_quantity: body.min_quantity,
            occurred_at: Utc::now(),
        }),
        make_stock_item,
    )?;

    Ok(Json(json!({
        "id": agg.to_string(),
        "stream_version": committed.last().map(|e| e.sequence_number).unwrap_or(0),
    }))
    .into_response())
}
