use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};

use stockbook_core::{AggregateId, DomainError};
use stockbook_infra::command_dispatcher::DispatchError;
use stockbook_infra::projections::aggregate_types;
use stockbook_inventory::{CloseItem, InventoryCommand, OpenItem, StockItem};
use stockbook_products::{
    CreateProduct, DeleteProduct, Product, ProductCommand, ProductDetails, ProductId,
    UpdateProduct,
};

use crate::app::dto;
use crate::app::errors::{ApiError, parse_id};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

fn make_product(id: AggregateId) -> Product {
    Product::empty(ProductId::new(id))
}

fn make_stock_item(id: AggregateId) -> StockItem {
    StockItem::empty(ProductId::new(id))
}

/// Creates the product and opens its stock item.
pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateProductRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let quantity = body.quantity.unwrap_or(0);
    let min_quantity = body.min_quantity.unwrap_or(services.low_stock_default);
    // Checked up front so a bad stock figure never leaves a product without stock.
    if quantity < 0 {
        return Err(DomainError::validation("quantity cannot be negative").into());
    }
    if min_quantity < 0 {
        return Err(DomainError::validation("min_quantity cannot be negative").into());
    }

    let agg = AggregateId::new();
    let product_id = ProductId::new(agg);
    let now = Utc::now();

    services.dispatch(
        agg,
        aggregate_types::PRODUCT,
        ProductCommand::CreateProduct(CreateProduct {
            product_id,
            details: body.details,
            occurred_at: now,
        }),
        make_product,
    )?;
    let opened = services.dispatch(
        agg,
        aggregate_types::STOCK_ITEM,
        InventoryCommand::OpenItem(OpenItem {
            item_id: product_id,
            opening_quantity: quantity,
            min_quantity,
            occurred_at: now,
        }),
        make_stock_item,
    );
    if let Err(err) = opened {
        return Err(roll_back_unstocked_product(&services, product_id, err));
    }

    info!(%product_id, quantity, "product created");
    Ok((StatusCode::CREATED, Json(json!({ "id": agg.to_string() }))).into_response())
}

/// Delete a product whose stock item could not be opened.
///
/// A publish failure means the item was stored, so the product stays.
fn roll_back_unstocked_product(
    services: &AppServices,
    product_id: ProductId,
    err: DispatchError,
) -> ApiError {
    if matches!(err, DispatchError::Publish(_)) {
        warn!(%product_id, error = %err, "stock item stored but not published");
        return err.into();
    }

    error!(%product_id, error = %err, "opening stock failed, deleting product");
    let undone = services.dispatch(
        product_id.0,
        aggregate_types::PRODUCT,
        ProductCommand::DeleteProduct(DeleteProduct {
            product_id,
            occurred_at: Utc::now(),
        }),
        make_product,
    );
    if let Err(undo_err) = undone {
        error!(%product_id, error = %undo_err, "product left without a stock item");
    }
    err.into()
}

pub async fn list_products(Extension(services): Extension<Arc<AppServices>>) -> Response {
    let items = services
        .products
        .list()
        .into_iter()
        .map(dto::product_to_json)
        .collect();
    Json(dto::list(items)).into_response()
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let product_id = ProductId::new(parse_id(&id)?);
    let rm = services
        .products
        .get(&product_id)
        .ok_or(ApiError::NotFound("product"))?;
    Ok(Json(dto::product_to_json(rm)).into_response())
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<ProductDetails>, JsonRejection>,
) -> Result<Response, ApiError> {
    let agg = parse_id(&id)?;
    let Json(details) = body?;

    let committed = services.dispatch(
        agg,
        aggregate_types::PRODUCT,
        ProductCommand::UpdateProduct(UpdateProduct {
            product_id: ProductId::new(agg),
            details,
            occurred_at: Utc::now(),
        }),
        make_product,
    )?;

    Ok(Json(json!({
        "id": agg.to_string(),
        "stream_version": committed.last().map(|e| e.sequence_number).unwrap_or(0),
    }))
    .into_response())
}

/// Deletes the product and closes its stock item.
pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let agg = parse_id(&id)?;
    let product_id = ProductId::new(agg);
    let now = Utc::now();

    services.dispatch(
        agg,
        aggregate_types::PRODUCT,
        ProductCommand::DeleteProduct(DeleteProduct {
            product_id,
            occurred_at: now,
        }),
        make_product,
    )?;

    let closed = services.dispatch(
        agg,
        aggregate_types::STOCK_ITEM,
        InventoryCommand::CloseItem(CloseItem {
            item_id: product_id,
            occurred_at: now,
        }),
        make_stock_item,
    );
    match closed {
        Ok(_) | Err(DispatchError::NotFound) => {}
        Err(e) => return Err(e.into()),
    }

    info!(%product_id, "product deleted");
    Ok(StatusCode::NO_CONTENT.into_response())
}
