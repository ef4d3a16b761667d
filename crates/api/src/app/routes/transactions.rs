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
use tracing::info;

use stockbook_core::AggregateId;
use stockbook_infra::projections::aggregate_types;
use stockbook_ledger::{
    AmendTransaction, LedgerCommand, LedgerTransaction, RecordTransaction, TransactionDetails,
    TransactionId, VoidTransaction,
};

use crate::app::dto;
use crate::app::errors::{ApiError, missing, parse_id};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_transactions).post(record_transaction))
        .route("/balance", get(running_balance))
        .route(
            "/:id",
            get(get_transaction)
                .put(amend_transaction)
                .delete(void_transaction),
        )
}

fn make_transaction(id: AggregateId) -> LedgerTransaction {
    LedgerTransaction::empty(TransactionId::new(id))
}

/// An entry must point at a live product and, when given, a live order.
fn check_references(services: &AppServices, details: &TransactionDetails) -> Result<(), ApiError> {
    services
        .live_product(details.product_id)
        .map_err(missing("product"))?;
    if let Some(order_id) = details.order_id {
        services.live_order(order_id).map_err(missing("order"))?;
    }
    Ok(())
}

pub async fn record_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<TransactionDetails>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(details) = body?;
    check_references(&services, &details)?;

    let agg = AggregateId::new();
    let transaction_id = TransactionId::new(agg);

    services.dispatch(
        agg,
        aggregate_types::TRANSACTION,
        LedgerCommand::RecordTransaction(RecordTransaction {
            transaction_id,
            details,
            occurred_at: Utc::now(),
        }),
        make_transaction,
    )?;

    info!(%transaction_id, "transaction recorded");
    Ok((StatusCode::CREATED, Json(json!({ "id": agg.to_string() }))).into_response())
}

pub async fn list_transactions(Extension(services): Extension<Arc<AppServices>>) -> Response {
    let items = services
        .ledger
        .list()
        .into_iter()
        .map(dto::transaction_to_json)
        .collect();
    Json(dto::list(items)).into_response()
}

pub async fn get_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let transaction_id = TransactionId::new(parse_id(&id)?);
    let t = services
        .ledger
        .get(&transaction_id)
        .ok_or(ApiError::NotFound("transaction"))?;
    Ok(Json(dto::transaction_to_json(t)).into_response())
}

pub async fn amend_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<TransactionDetails>, JsonRejection>,
) -> Result<Response, ApiError> {
    let transaction_id = TransactionId::new(parse_id(&id)?);
    let Json(details) = body?;
    check_references(&services, &details)?;

    let committed = services.dispatch(
        transaction_id.0,
        aggregate_types::TRANSACTION,
        LedgerCommand::AmendTransaction(AmendTransaction {
            transaction_id,
            details,
            occurred_at: Utc::now(),
        }),
        make_transaction,
    )?;

    Ok(Json(json!({
        "id": transaction_id.to_string(),
        "stream_version": committed.last().map(|e| e.sequence_number).unwrap_or(0),
    }))
    .into_response())
}

pub async fn void_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let transaction_id = TransactionId::new(parse_id(&id)?);

    services.dispatch(
        transaction_id.0,
        aggregate_types::TRANSACTION,
        LedgerCommand::VoidTransaction(VoidTransaction {
            transaction_id,
            occurred_at: Utc::now(),
        }),
        make_transaction,
    )?;

    info!(%transaction_id, "transaction voided");
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Date-ascending running balance over every live entry.
pub async fn running_balance(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Response, ApiError> {
    let series = services.ledger.running_balance()?;
    Ok(Json(dto::balance_to_json(series)).into_response())
}
