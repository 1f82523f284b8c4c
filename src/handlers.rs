use crate::{
    AppState,
    access::{require_role, require_self_or_admin},
    auth::AuthUser,
    error::{AppError, AppJson, ErrorBody},
    models::{
        AuthResponse, LoginRequest, PromoteResponse, Role, SignupRequest, Task, TaskRequest, UserPage,
        UserProfile,
    },
    pagination::{PageQuery, PageWindow},
    usecase::PromoteOutcome,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

// --- Public ---

/// signup
///
/// [Public Route] Creates an account and returns it with a first token pair.
#[utoipa::path(
    post,
    path = "/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created", body = AuthResponse),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 409, description = "Email or phone already registered", body = ErrorBody)
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let user = state.users.signup(payload).await?;
    Ok((StatusCode::CREATED, Json(user.try_into()?)))
}

/// login
///
/// [Public Route] Exchanges email and password for a fresh token pair.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 400, description = "Unreadable payload", body = ErrorBody),
        (status = 401, description = "Wrong password", body = ErrorBody),
        (status = 404, description = "Unknown email", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = state.users.login(&payload.email, &payload.password).await?;
    Ok(Json(user.try_into()?))
}

// --- Users ---

/// get_users
///
/// [Admin Route] One page of users plus the total count.
#[utoipa::path(
    get,
    path = "/users",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of users", body = UserPage),
        (status = 403, description = "Caller is not an admin", body = ErrorBody)
    )
)]
pub async fn get_users(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<UserPage>, AppError> {
    require_role(&identity, Role::Admin)?;

    let page = state.users.get_users(PageWindow::from_query(&query)).await?;
    Ok(Json(UserPage {
        total_count: page.total_count,
        user_items: page.items.into_iter().map(UserProfile::from).collect(),
    }))
}

/// get_user
///
/// [Authenticated Route] A single user. Callers may read themselves; admins
/// may read anyone.
#[utoipa::path(
    get,
    path = "/users/{user_id}",
    params(("user_id" = String, Path, description = "Subject id of the user")),
    responses(
        (status = 200, description = "Found", body = UserProfile),
        (status = 403, description = "Neither self nor admin", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn get_user(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserProfile>, AppError> {
    require_self_or_admin(&identity, &user_id)?;

    let user = state.users.get_user(&user_id).await?;
    Ok(Json(user.into()))
}

/// promote_user
///
/// [Admin Route] Raises a user to ADMIN. Promoting an admin is a successful
/// no-op.
#[utoipa::path(
    post,
    path = "/users/{user_id}/promote",
    params(("user_id" = String, Path, description = "Subject id of the user")),
    responses(
        (status = 200, description = "Promoted or already admin", body = PromoteResponse),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn promote_user(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<PromoteResponse>, AppError> {
    require_role(&identity, Role::Admin)?;

    let outcome = state.users.promote(&user_id).await?;
    let message = match outcome {
        PromoteOutcome::Promoted => "user promoted to admin",
        PromoteOutcome::NoOp => "user is already an admin",
    };

    Ok(Json(PromoteResponse {
        outcome: outcome.as_str().to_string(),
        message: message.to_string(),
    }))
}

// --- Tasks ---

/// list_tasks
///
/// [Authenticated Route] All tasks.
#[utoipa::path(
    get,
    path = "/tasks",
    responses((status = 200, description = "All tasks", body = [Task]))
)]
pub async fn list_tasks(
    AuthUser(_identity): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Task>>, AppError> {
    Ok(Json(state.tasks.list().await?))
}

#[utoipa::path(
    get,
    path = "/tasks/{task_id}",
    params(("task_id" = String, Path, description = "Task id")),
    responses(
        (status = 200, description = "Found", body = Task),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn get_task(
    AuthUser(_identity): AuthUser,
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<Task>, AppError> {
    Ok(Json(state.tasks.get(&task_id).await?))
}

/// create_task
///
/// [Admin Route] Adds a task. The id is taken from the body when present.
#[utoipa::path(
    post,
    path = "/tasks",
    request_body = TaskRequest,
    responses(
        (status = 201, description = "Created", body = Task),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 409, description = "Id already used", body = ErrorBody)
    )
)]
pub async fn create_task(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<TaskRequest>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    require_role(&identity, Role::Admin)?;

    let task = state.tasks.create(payload).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// update_task
///
/// [Admin Route] Replaces a task's fields.
#[utoipa::path(
    put,
    path = "/tasks/{task_id}",
    params(("task_id" = String, Path, description = "Task id")),
    request_body = TaskRequest,
    responses(
        (status = 200, description = "Updated", body = Task),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn update_task(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    AppJson(payload): AppJson<TaskRequest>,
) -> Result<Json<Task>, AppError> {
    require_role(&identity, Role::Admin)?;

    Ok(Json(state.tasks.update(&task_id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/tasks/{task_id}",
    params(("task_id" = String, Path, description = "Task id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn delete_task(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<StatusCode, AppError> {
    require_role(&identity, Role::Admin)?;

    state.tasks.delete(&task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
