use std::{env, time::Duration};

/// Budget for a single use-case call when `CONTEXT_TIMEOUT_SECS` is unset.
pub const DEFAULT_CONTEXT_TIMEOUT_SECS: u64 = 100;
/// Larger `CONTEXT_TIMEOUT_SECS` values are clamped to this.
pub const MAX_CONTEXT_TIMEOUT_SECS: u64 = 60 * 60;
pub const DEFAULT_PORT: u16 = 8080;

const LOCAL_SECRET: &str = "local-development-secret-do-not-deploy";
const LOCAL_MONGODB_URI: &str = "mongodb://localhost:27017";
const DEFAULT_DATABASE_NAME: &str = "task_manager";

/// AppConfig
///
/// Everything the process reads from its environment, loaded once at startup
/// and immutable afterwards. `main` hands the pieces to the components that
/// need them; it is not part of the request state.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Selects log format and how strict loading is.
    pub env: Env,
    // MongoDB connection string.
    pub mongodb_uri: String,
    pub database_name: String,
    // HS256 signing secret for access and refresh tokens.
    pub secret_key: String,
    // Deadline applied to every use-case call.
    pub context_timeout: Duration,
    pub port: u16,
}

/// Env
///
/// `local` gets pretty logs and development fallbacks; `production` gets JSON
/// logs and refuses to start without its secrets.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Env {
    fn from_var(value: Option<String>) -> Self {
        match value.as_deref() {
            Some("production") => Env::Production,
            _ => Env::Local,
        }
    }
}

impl Default for AppConfig {
    /// default
    ///
    /// Test-safe configuration that touches no environment variables.
    fn default() -> Self {
        Self {
            env: Env::Local,
            mongodb_uri: LOCAL_MONGODB_URI.to_string(),
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            secret_key: LOCAL_SECRET.to_string(),
            context_timeout: Duration::from_secs(DEFAULT_CONTEXT_TIMEOUT_SECS),
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the environment (call `dotenv` first).
    ///
    /// # Panics
    /// In production, panics when `SECRET_KEY` or `MONGODB_URI` is missing or
    /// empty. The process must not come up able to mint tokens with a guessable
    /// secret.
    pub fn load() -> Self {
        let env = Env::from_var(env::var("APP_ENV").ok());

        let (secret_key, mongodb_uri) = match env {
            Env::Production => (
                required("SECRET_KEY"),
                required("MONGODB_URI"),
            ),
            Env::Local => (
                optional("SECRET_KEY").unwrap_or_else(|| LOCAL_SECRET.to_string()),
                optional("MONGODB_URI").unwrap_or_else(|| LOCAL_MONGODB_URI.to_string()),
            ),
        };

        let database_name =
            optional("DATABASE_NAME").unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string());

        let context_timeout = Duration::from_secs(
            optional("CONTEXT_TIMEOUT_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(|secs| secs.min(MAX_CONTEXT_TIMEOUT_SECS))
                .unwrap_or(DEFAULT_CONTEXT_TIMEOUT_SECS),
        );

        let port = optional("PORT")
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            env,
            mongodb_uri,
            database_name,
            secret_key,
            context_timeout,
            port,
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required(key: &str) -> String {
    optional(key).unwrap_or_else(|| panic!("FATAL: {key} must be set in production."))
}
