//! Customers and suppliers share one set of handlers. The nested router is
//! layered with the [`PartyKind`] it serves, and every handler stays inside
//! that kind: a supplier id under `/customers` is simply not found.

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
use stockbook_parties::{
    Party, PartyCommand, PartyDetails, PartyId, PartyKind, RegisterParty, RemoveParty,
    UpdateDetails,
};

use crate::app::dto;
use crate::app::errors::{ApiError, missing, parse_id};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_parties).post(create_party))
        .route(
            "/:id",
            get(get_party).put(update_party).delete(delete_party),
        )
}

fn make_party(id: AggregateId) -> Party {
    Party::empty(PartyId::new(id))
}

fn entity(kind: PartyKind) -> &'static str {
    kind.as_str()
}

pub async fn create_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(kind): Extension<PartyKind>,
    body: Result<Json<PartyDetails>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(details) = body?;
    let agg = AggregateId::new();
    let party_id = PartyId::new(agg);

    services.dispatch(
        agg,
        aggregate_types::PARTY,
        PartyCommand::RegisterParty(RegisterParty {
            party_id,
            kind,
            details,
            occurred_at: Utc::now(),
        }),
        make_party,
    )?;

    info!(%party_id, kind = kind.as_str(), "party registered");
    Ok((StatusCode::CREATED, Json(json!({ "id": agg.to_string() }))).into_response())
}

pub async fn list_parties(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(kind): Extension<PartyKind>,
) -> Response {
    let items = services
        .parties
        .list(kind)
        .into_iter()
        .map(dto::party_to_json)
        .collect();
    Json(dto::list(items)).into_response()
}

pub async fn get_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(kind): Extension<PartyKind>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let party_id = PartyId::new(parse_id(&id)?);
    let rm = services
        .parties
        .get_kind(&party_id, kind)
        .ok_or(ApiError::NotFound(entity(kind)))?;
    Ok(Json(dto::party_to_json(rm)).into_response())
}

pub async fn update_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(kind): Extension<PartyKind>,
    Path(id): Path<String>,
    body: Result<Json<PartyDetails>, JsonRejection>,
) -> Result<Response, ApiError> {
    let party_id = PartyId::new(parse_id(&id)?);
    let Json(details) = body?;
    services
        .live_party(party_id, kind)
        .map_err(missing(entity(kind)))?;

    let committed = services.dispatch(
        party_id.0,
        aggregate_types::PARTY,
        PartyCommand::UpdateDetails(UpdateDetails {
            party_id,
            details,
            occurred_at: Utc::now(),
        }),
        make_party,
    )?;

    Ok(Json(json!({
        "id": party_id.to_string(),
        "stream_version": committed.last().map(|e| e.sequence_number).unwrap_or(0),
    }))
    .into_response())
}

pub async fn delete_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(kind): Extension<PartyKind>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let party_id = PartyId::new(parse_id(&id)?);
    services
        .live_party(party_id, kind)
        .map_err(missing(entity(kind)))?;

    services.dispatch(
        party_id.0,
        aggregate_types::PARTY,
        PartyCommand::RemoveParty(RemoveParty {
            party_id,
            occurred_at: Utc::now(),
        }),
        make_party,
    )?;

    info!(%party_id, kind = kind.as_str(), "party removed");
    Ok(StatusCode::NO_CONTENT.into_response())
}
