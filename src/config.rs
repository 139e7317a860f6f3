//! Environment-driven configuration for the Lambda functions and the CLI.
//!
//! Every struct is built from a lookup function so tests can supply values
//! without touching the process environment; `from_env` wires in [`std::env::var`].

use std::time::Duration;

use crate::infra::telegram::DEFAULT_API_BASE_URL;

pub const SECRET_PARAM_VAR: &str = "TELEGRAM_SECRET_PARAM";
pub const IDENTITY_HEADER_VAR: &str = "IDENTITY_HEADER_NAME";
pub const TOKEN_PARAM_VAR: &str = "TELEGRAM_TOKEN_PARAM";
pub const API_BASE_URL_VAR: &str = "TELEGRAM_API_BASE_URL";
pub const HTTP_TIMEOUT_VAR: &str = "TELEGRAM_HTTP_TIMEOUT_SECS";

/// Header Telegram sets on webhook deliveries when a secret token is registered.
pub const DEFAULT_IDENTITY_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Treats unset and blank values the same way.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizerConfig {
    /// SSM parameter holding the expected secret. `None` means misconfigured.
    pub secret_param: Option<String>,
    pub identity_header: String,
}

impl AuthorizerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            secret_param: non_empty(lookup(SECRET_PARAM_VAR)),
            identity_header: non_empty(lookup(IDENTITY_HEADER_VAR))
                .unwrap_or_else(|| DEFAULT_IDENTITY_HEADER.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// SSM parameter holding the bot token. `None` means misconfigured.
    pub token_param: Option<String>,
    pub api_base_url: String,
    pub http_timeout: Duration,
    pub connect_timeout: Duration,
}

impl RelayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let http_timeout = non_empty(lookup(HTTP_TIMEOUT_VAR))
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT);

        Self {
            token_param: non_empty(lookup(TOKEN_PARAM_VAR)),
            api_base_url: non_empty(lookup(API_BASE_URL_VAR))
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            http_timeout,
            connect_timeout: CONNECT_TIMEOUT.min(http_timeout),
        }
    }
}
