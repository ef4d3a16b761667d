use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;

use stockbook_parties::PartyKind;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::routes::transactions;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/stats", get(stats))
        .route("/sales", get(sales))
        .route("/balance", get(transactions::running_balance))
}

/// Headline counts and money figures. Revenue excludes cancelled orders.
pub async fn stats(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Response, ApiError> {
    let revenue = services.orders.revenue()?;
    let balance = services.ledger.current_balance()?;

    Ok(Json(json!({
        "products": services.products.list().len(),
        "customers": services.parties.list(PartyKind::Customer).len(),
        "suppliers": services.parties.list(PartyKind::Supplier).len(),
        "orders": services.orders.list().len(),
        "revenue": revenue.to_display_string(),
        "balance": balance.to_display_string(),
        "low_stock": services.stock.low_stock().len(),
    }))
    .into_response())
}

pub async fn sales(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Response, ApiError> {
    let months = services.orders.monthly_sales()?;
    Ok(Json(dto::monthly_sales_to_json(months)).into_response())
}
