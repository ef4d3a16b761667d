use axum::{Extension, Router};

use stockbook_parties::PartyKind;

use crate::middleware::AuthState;

pub mod auth;
pub mod dashboard;
pub mod inventory;
pub mod orders;
pub mod parties;
pub mod products;
pub mod system;
pub mod transactions;

/// Router for every endpoint except `/health`. Only `/auth/me` checks the
/// bearer token.
pub fn router(auth_state: AuthState) -> Router {
    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/products", products::router())
        .nest("/inventory", inventory::router())
        .nest(
            "/customers",
            parties::router().layer(Extension(PartyKind::Customer)),
        )
        .nest(
            "/suppliers",
            parties::router().layer(Extension(PartyKind::Supplier)),
        )
        .nest("/orders", orders::router())
        .nest("/transactions", transactions::router())
        .nest("/dashboard", dashboard::router())
}

