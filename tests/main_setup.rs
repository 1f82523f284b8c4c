use serial_test::serial;
use std::{env, panic, time::Duration};
use task_manager::{
    AppConfig,
    config::{DEFAULT_CONTEXT_TIMEOUT_SECS, DEFAULT_PORT, Env, MAX_CONTEXT_TIMEOUT_SECS},
};

const VARS: [&str; 6] = [
    "APP_ENV",
    "MONGODB_URI",
    "DATABASE_NAME",
    "SECRET_KEY",
    "CONTEXT_TIMEOUT_SECS",
    "PORT",
];

// --- Setup/Teardown Utilities ---

/// Runs `test` with exactly `vars` set (every other config variable cleared),
/// then restores the environment as it was.
fn run_with_env<T, R>(vars: &[(&str, &str)], test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> =
        VARS.iter().map(|&var| (var, env::var(var).ok())).collect();

    unsafe {
        for var in VARS {
            env::remove_var(var);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    let result = panic::catch_unwind(test);

    for (key, original_value) in originals {
        unsafe {
            match original_value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

// --- Tests ---

#[test]
#[serial]
fn test_local_config_falls_back_to_defaults() {
    let config = run_with_env(&[], AppConfig::load);

    assert_eq!(config.env, Env::Local);
    assert!(!config.secret_key.is_empty());
    assert_eq!(config.mongodb_uri, "mongodb://localhost:27017");
    assert_eq!(
        config.context_timeout,
        Duration::from_secs(DEFAULT_CONTEXT_TIMEOUT_SECS)
    );
    assert_eq!(config.port, DEFAULT_PORT);
}

#[test]
#[serial]
fn test_local_config_reads_overrides() {
    let config = run_with_env(
        &[
            ("SECRET_KEY", "from-env"),
            ("MONGODB_URI", "mongodb://db:27017"),
            ("DATABASE_NAME", "tasks_dev"),
            ("CONTEXT_TIMEOUT_SECS", "7"),
            ("PORT", "9090"),
        ],
        AppConfig::load,
    );

    assert_eq!(config.secret_key, "from-env");
    assert_eq!(config.mongodb_uri, "mongodb://db:27017");
    assert_eq!(config.database_name, "tasks_dev");
    assert_eq!(config.context_timeout, Duration::from_secs(7));
    assert_eq!(config.port, 9090);
}

#[test]
#[serial]
fn test_unparsable_numbers_use_defaults() {
    let config = run_with_env(
        &[("CONTEXT_TIMEOUT_SECS", "soon"), ("PORT", "http")],
        AppConfig::load,
    );

    assert_eq!(
        config.context_timeout,
        Duration::from_secs(DEFAULT_CONTEXT_TIMEOUT_SECS)
    );
    assert_eq!(config.port, DEFAULT_PORT);
}

#[test]
#[serial]
fn test_oversized_timeout_is_clamped() {
    let config = run_with_env(
        &[("CONTEXT_TIMEOUT_SECS", "18446744073709551615")],
        AppConfig::load,
    );

    assert_eq!(
        config.context_timeout,
        Duration::from_secs(MAX_CONTEXT_TIMEOUT_SECS)
    );
}

#[test]
#[serial]
fn test_production_fails_fast_without_secret() {
    let result = run_with_env(
        &[
            ("APP_ENV", "production"),
            ("MONGODB_URI", "mongodb://prod:27017"),
        ],
        || panic::catch_unwind(AppConfig::load),
    );

    assert!(result.is_err(), "expected a panic when SECRET_KEY is missing");
}

#[test]
#[serial]
fn test_production_fails_fast_without_database() {
    let result = run_with_env(
        &[("APP_ENV", "production"), ("SECRET_KEY", "prod-secret")],
        || panic::catch_unwind(AppConfig::load),
    );

    assert!(result.is_err(), "expected a panic when MONGODB_URI is missing");
}

#[test]
#[serial]
fn test_production_config_loads_when_complete() {
    let config = run_with_env(
        &[
            ("APP_ENV", "production"),
            ("SECRET_KEY", "prod-secret"),
            ("MONGODB_URI", "mongodb://prod:27017"),
        ],
        AppConfig::load,
    );

    assert_eq!(config.env, Env::Production);
    assert_eq!(config.secret_key, "prod-secret");
}

#[test]
fn test_default_config_is_test_safe() {
    let config = AppConfig::default();
    assert_eq!(config.env, Env::Local);
    assert!(!config.secret_key.is_empty());
    assert_eq!(config.context_timeout, Duration::from_secs(100));
}
