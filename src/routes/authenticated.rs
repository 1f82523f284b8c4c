use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Routes open to any caller holding a valid access token. The gate layer is
/// applied by `create_router`, so every handler here can rely on `AuthUser`.
///
/// Task mutation shares paths with the task reads, so those methods live here
/// too; their handlers check for the ADMIN role themselves.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /users/{user_id}
        // Self-or-admin check happens in the handler.
        .route("/users/{user_id}", get(handlers::get_user))
        // GET/POST /tasks
        .route(
            "/tasks",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        // GET/PUT/DELETE /tasks/{task_id}
        .route(
            "/tasks/{task_id}",
            get(handlers::get_task)
                .put(handlers::update_task)
                .delete(handlers::delete_task),
        )
}
