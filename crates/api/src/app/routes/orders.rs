use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use stockbook_core::AggregateId;
use stockbook_infra::projections::{OrderReadModel, aggregate_types};
use stockbook_parties::PartyKind;
use stockbook_sales::{
    ChangeStatus, DeleteOrder, LineItem, Order, OrderCommand, OrderId, PlaceOrder, ReplaceItems,
    order_total,
};

use crate::app::dto;
use crate::app::errors::{ApiError, missing, parse_id};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route(
            "/:id",
            get(get_order).put(replace_items).delete(delete_order),
        )
        .route("/:id/status", post(change_status))
}

fn make_order(id: AggregateId) -> Order {
    Order::empty(OrderId::new(id))
}

/// Turn requested items into priced line items. Every product must exist;
/// a missing unit price means the product's current price.
fn resolve_items(
    services: &AppServices,
    items: Vec<dto::OrderItemRequest>,
) -> Result<Vec<LineItem>, ApiError> {
    items
        .into_iter()
        .map(|item| {
            let product = services
                .live_product(item.product_id)
                .map_err(missing("product"))?;
            let current_price = product
                .details()
                .map(|d| d.price)
                .ok_or(ApiError::NotFound("product"))?;
            Ok(LineItem {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price.unwrap_or(current_price),
            })
        })
        .collect()
}

fn render(services: &AppServices, rm: OrderReadModel) -> Result<serde_json::Value, ApiError> {
    let customer_name = services.parties.get(&rm.customer_id).map(|p| p.name);
    Ok(dto::order_to_json(rm, customer_name)?)
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateOrderRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    services
        .live_party(body.customer_id, PartyKind::Customer)
        .map_err(missing("customer"))?;
    let items = resolve_items(&services, body.items)?;
    let total = order_total(&items)?;

    let agg = AggregateId::new();
    let order_id = OrderId::new(agg);
    let now = Utc::now();

    services.dispatch(
        agg,
        aggregate_types::ORDER,
        OrderCommand::PlaceOrder(PlaceOrder {
            order_id,
            customer_id: body.customer_id,
            items,
            placed_on: now.date_naive(),
            occurred_at: now,
        }),
        make_order,
    )?;

    info!(%order_id, total = %total, "order placed");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": agg.to_string(),
            "total": total.to_display_string(),
        })),
    )
        .into_response())
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Response, ApiError> {
    let items = services
        .orders
        .list()
        .into_iter()
        .map(|rm| render(&services, rm))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(dto::list(items)).into_response())
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let order_id = OrderId::new(parse_id(&id)?);
    let rm = services
        .orders
        .get(&order_id)
        .ok_or(ApiError::NotFound("order"))?;
    Ok(Json(render(&services, rm)?).into_response())
}

/// Replaces the whole item list; the total is recomputed.
pub async fn replace_items(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::ReplaceItemsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let order_id = OrderId::new(parse_id(&id)?);
    let Json(body) = body?;
    services.live_order(order_id).map_err(missing("order"))?;
    let items = resolve_items(&services, body.items)?;
    let total = order_total(&items)?;

    services.dispatch(
        order_id.0,
        aggregate_types::ORDER,
        OrderCommand::ReplaceItems(ReplaceItems {
            order_id,
            items,
            occurred_at: Utc::now(),
        }),
        make_order,
    )?;

    Ok(Json(json!({
        "id": order_id.to_string(),
        "total": total.to_display_string(),
    }))
    .into_response())
}

pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::ChangeStatusRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let order_id = OrderId::new(parse_id(&id)?);
    let Json(body) = body?;

    services.dispatch(
        order_id.0,
        aggregate_types::ORDER,
        OrderCommand::ChangeStatus(ChangeStatus {
            order_id,
            status: body.status,
            occurred_at: Utc::now(),
        }),
        make_order,
    )?;

    info!(%order_id, status = %body.status, "order status changed");
    Ok(Json(json!({
        "id": order_id.to_string(),
        "status": body.status.as_str(),
    }))
    .into_response())
}

pub async fn delete_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let order_id = OrderId::new(parse_id(&id)?);

    services.dispatch(
        order_id.0,
        aggregate_types::ORDER,
        OrderCommand::DeleteOrder(DeleteOrder {
            order_id,
            occurred_at: Utc::now(),
        }),
        make_order,
    )?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
