use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod access;
pub mod auth;
pub mod config;
pub mod deadline;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod pagination;
pub mod password;
pub mod repository;
pub mod token;
pub mod usecase;

// Routing split by caller (public, authenticated, admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use repository::{TaskStoreState, UserDirectoryState};
pub use token::TokenService;
pub use usecase::{TaskUseCase, UserUseCase};

/// ApiDoc
///
/// OpenAPI document assembled from the `#[utoipa::path]` handlers and the
/// `ToSchema` models. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::signup, handlers::login, handlers::get_users, handlers::get_user,
        handlers::promote_user, handlers::list_tasks, handlers::get_task,
        handlers::create_task, handlers::update_task, handlers::delete_task
    ),
    components(
        schemas(
            models::Role, models::UserProfile, models::Task, models::SignupRequest,
            models::LoginRequest, models::TaskRequest, models::UserPage,
            models::PromoteResponse, models::AuthResponse, token::TokenPair, error::ErrorBody,
        )
    ),
    tags(
        (name = "task-manager", description = "Task manager API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Everything a request may need, built once in `main` and cloned per request.
/// All members are cheap handles over shared, immutable or internally
/// synchronized state.
#[derive(Clone)]
pub struct AppState {
    /// Signup, login, promote and user reads.
    pub users: UserUseCase,
    /// Task CRUD.
    pub tasks: TaskUseCase,
    /// Token verification for the auth gate.
    pub tokens: TokenService,
}

impl AppState {
    /// Wires the use cases over the given repositories.
    pub fn new(
        config: AppConfig,
        users: UserDirectoryState,
        tasks: TaskStoreState,
        tokens: TokenService,
        hasher: password::PasswordHasher,
    ) -> Self {
        Self {
            users: UserUseCase::new(users, tokens.clone(), hasher, config.context_timeout),
            tasks: TaskUseCase::new(tasks, config.context_timeout),
            tokens,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

/// create_router
///
/// Assembles the routing tree, puts the auth gate in front of every protected
/// route, and wraps the lot in the request-id, tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // Protected routes share one gate; admin handlers add their role check.
    let protected = authenticated::authenticated_routes()
        .merge(admin::admin_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(protected)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one HTTP request, tagged with its `x-request-id` so every log line
/// it produces can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
