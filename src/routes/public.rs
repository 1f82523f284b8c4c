use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token: liveness and the two ways of obtaining
/// one.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Load balancer probe. Touches no storage.
        .route("/health", get(|| async { "ok" }))
        // POST /signup
        .route("/signup", post(handlers::signup))
        // POST /login
        // Re-issues the token pair on a correct password.
        .route("/login", post(handlers::login))
}
