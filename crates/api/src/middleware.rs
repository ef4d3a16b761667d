use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::debug;

use stockbook_auth::JwtValidator;

use crate::app::errors::json_error;
use crate::context::UserContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// Require a valid `Authorization: Bearer <token>` and attach [`UserContext`].
///
/// Rejections use the regular `{"error", "message"}` body with a 401.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let unauthorized = |message: &str| json_error(StatusCode::UNAUTHORIZED, "unauthorized", message);

    let token = bearer_token(req.headers()).ok_or_else(|| unauthorized("missing bearer token"))?;
    let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
        debug!(error = %e, "bearer token rejected");
        unauthorized("invalid or expired token")
    })?;

    req.extensions_mut().insert(UserContext::from_claims(&claims));
    Ok(next.run(req).await)
}

/// The token of a `Bearer` authorization header, if there is a non-empty one.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
