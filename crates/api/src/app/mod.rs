//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: in-memory event store, bus, projections and dispatcher
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::io;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Spawns the projection worker, so it must be called once per process (or
/// once per test server).
pub fn build_app(config: ApiConfig) -> io::Result<Router> {
    let services = Arc::new(services::AppServices::build(&config)?);
    let auth_state = middleware::AuthState {
        jwt: services.jwt_validator(),
    };

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router(auth_state))
        .layer(Extension(services))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(config.cors_allow_origin.as_deref())),
        ))
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let allow_origin = match origin.map(HeaderValue::from_str) {
        Some(Ok(value)) => AllowOrigin::exact(value),
        Some(Err(_)) => {
            tracing::warn!(origin = ?origin, "ignoring unparsable CORS origin");
            AllowOrigin::any()
        }
        None => AllowOrigin::any(),
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}
