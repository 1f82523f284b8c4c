use bson::doc;
use mongodb::Client;
use std::sync::Arc;
use task_manager::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    password::{PasswordConfig, PasswordHasher},
    repository::{MongoTaskStore, MongoUserDirectory, TaskStoreState, UserDirectoryState},
    token::TokenService,
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, installs logging, connects to MongoDB, wires the
/// services together and serves HTTP until the process is stopped.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast in production)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise sensible local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "task_manager=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Signing secret. Refuse to start without one.
    let tokens = TokenService::new(&config.secret_key)
        .expect("FATAL: SECRET_KEY is empty; cannot sign tokens.");
    let hasher = PasswordHasher::new(&PasswordConfig::default())
        .expect("FATAL: invalid password hashing parameters.");

    // 4. Database (MongoDB)
    let client = Client::with_uri_str(&config.mongodb_uri)
        .await
        .expect("FATAL: Failed to parse MONGODB_URI.");
    let db = client.database(&config.database_name);
    db.run_command(doc! { "ping": 1 })
        .await
        .expect("FATAL: Failed to reach MongoDB. Check MONGODB_URI.");
    tracing::info!(database = %config.database_name, "connected to MongoDB");

    let users = Arc::new(
        MongoUserDirectory::new(&db)
            .await
            .expect("FATAL: Failed to prepare the users collection."),
    ) as UserDirectoryState;
    let tasks = Arc::new(
        MongoTaskStore::new(&db)
            .await
            .expect("FATAL: Failed to prepare the tasks collection."),
    ) as TaskStoreState;

    // 5. State assembly and server startup
    let port = config.port;
    let app = create_router(AppState::new(config, users, tasks, tokens, hasher));

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {addr}");
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:{port}/swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
