use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Routes that only make sense for ADMIN callers. Mounted behind the same gate
/// as the authenticated routes; each handler then runs `require_role`, so a
/// USER token gets 403 rather than 401.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /users?page=&recordsPerPage=
        .route("/users", get(handlers::get_users))
        // POST /users/{user_id}/promote
        .route("/users/{user_id}/promote", post(handlers::promote_user))
}
