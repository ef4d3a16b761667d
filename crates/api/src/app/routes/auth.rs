use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tracing::info;

use stockbook_auth::{NewUser, UserAccount};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::UserContext;
use crate::middleware::{AuthState, auth_middleware};

pub fn router(auth_state: AuthState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route(
            "/me",
            get(me).route_layer(axum::middleware::from_fn_with_state(
                auth_state,
                auth_middleware,
            )),
        )
}

fn token_response(
    services: &AppServices,
    account: &UserAccount,
    status: StatusCode,
) -> Result<Response, ApiError> {
    let token = services.issue_token(account)?;
    Ok((
        status,
        Json(json!({
            "token": token,
            "user": dto::user_to_json(account),
        })),
    )
        .into_response())
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<NewUser>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let account = services.register_user(body).await?;
    info!(user_id = %account.id, "user registered");
    token_response(&services, &account, StatusCode::CREATED)
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let account = services.authenticate(&body.email, body.password).await?;
    token_response(&services, &account, StatusCode::OK)
}

/// Identity behind the bearer token. `name` is present when the account is
/// known to this process.
pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> Json<serde_json::Value> {
    let name = services.user(user.email()).map(|account| account.name);
    Json(json!({
        "id": user.user_id().to_string(),
        "email": user.email(),
        "role": user.role().as_str(),
        "name": name,
    }))
}
