//! Environment variable names used by this crate for convenient
//! configuration of the hook from microservices.
//!
//! These are purely helpers; the hook itself only ever sees resolved
//! [`Credentials`] and never reads the environment.

use crate::storage::Credentials;

/// Fallback storage account name.
pub const ACCOUNT_NAME_ENV: &str = "ACCOUNT_NAME";

/// Fallback storage account key (base64).
pub const ACCOUNT_KEY_ENV: &str = "ACCOUNT_KEY";

/// Target table name, used by [`HookConfig::from_env`](crate::hook::HookConfig::from_env).
pub const LOG_SINK_TABLE_ENV: &str = "LOG_SINK_TABLE";

/// Minimum severity, e.g. `info` or `warning`.
pub const LOG_SINK_LEVEL_ENV: &str = "LOG_SINK_LEVEL";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Resolve credentials against the process environment.
///
/// See [`resolve_credentials_with`].
pub fn resolve_credentials(account_name: &str, account_key: &str) -> Credentials {
    resolve_credentials_with(account_name, account_key, |key| std::env::var(key).ok())
}

/// Use the given name and key when both are present. If either one is
/// empty, both are replaced by [`ACCOUNT_NAME_ENV`] and [`ACCOUNT_KEY_ENV`]
/// as returned by `lookup`; partial overrides are not supported. Missing
/// variables resolve to empty strings, which the service connector rejects.
pub fn resolve_credentials_with<F>(account_name: &str, account_key: &str, lookup: F) -> Credentials
where
    F: Fn(&str) -> Option<String>,
{
    if account_name.is_empty() || account_key.is_empty() {
        Credentials::new(
            lookup(ACCOUNT_NAME_ENV).unwrap_or_default(),
            lookup(ACCOUNT_KEY_ENV).unwrap_or_default(),
        )
    } else {
        Credentials::new(account_name, account_key)
    }
}
