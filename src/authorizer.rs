//! Webhook request authorizer.
//!
//! Validates the secret token Telegram attaches to every webhook delivery
//! against the value stored in the parameter store. The decision is computed
//! as a [`Decision`] and only turned into the gateway's simple-response shape
//! ([`AuthorizerResponse`]) at the edge.
//!
//! Every failure denies: a missing header, a missing parameter name, a failed
//! or timed-out fetch and a mismatch all produce `isAuthorized: false`. The
//! wire context only separates "missing token" and "configuration error" from
//! "invalid token"; the precise [`Denial`] is logged for operators.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::AuthorizerConfig;
use crate::infra::keys::KeyStore;

/// Time kept back from the invocation deadline so a stalled fetch still
/// leaves room to return a decision.
pub const DEADLINE_MARGIN: Duration = Duration::from_millis(250);

/// API Gateway HTTP API REQUEST authorizer payload (format 2.0).
///
/// Only the fields the authorizer reads are modeled; the rest is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerRequest {
    #[serde(default)]
    pub route_key: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl AuthorizerRequest {
    /// Looks up `name` ignoring ASCII case (HTTP APIs lowercase header names).
    ///
    /// An exact key wins, then the lowercase key. Any other spellings are
    /// resolved by taking the smallest key, so the result never depends on
    /// map iteration order.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .or_else(|| self.headers.get(&name.to_ascii_lowercase()))
            .or_else(|| {
                self.headers
                    .iter()
                    .filter(|(key, _)| key.eq_ignore_ascii_case(name))
                    .min_by(|(a, _), (b, _)| a.cmp(b))
                    .map(|(_, value)| value)
            })
            .map(String::as_str)
    }
}

/// Simple response understood by HTTP API Lambda authorizers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerResponse {
    pub is_authorized: bool,
    pub context: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// Identity header absent or empty.
    MissingToken,
    /// Secret parameter name not configured.
    ConfigError,
    /// Parameter store call failed or ran out of time.
    FetchError,
    /// Token did not match the stored secret.
    InvalidToken,
}

impl Denial {
    pub fn reason(self) -> &'static str {
        match self {
            Denial::MissingToken => "missing-token",
            Denial::ConfigError => "config-error",
            Denial::FetchError => "fetch-error",
            Denial::InvalidToken => "invalid-token",
        }
    }

    /// Message exposed to the gateway. Fetch failures read the same as a bad token.
    fn public_message(self) -> &'static str {
        match self {
            Denial::MissingToken => "missing or invalid token",
            Denial::ConfigError => "configuration error",
            Denial::FetchError | Denial::InvalidToken => "invalid token",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Authorized,
    Denied(Denial),
}

impl Decision {
    pub fn is_authorized(self) -> bool {
        matches!(self, Decision::Authorized)
    }

    pub fn reason(self) -> &'static str {
        match self {
            Decision::Authorized => "authorized",
            Decision::Denied(denial) => denial.reason(),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

impl From<Decision> for AuthorizerResponse {
    fn from(decision: Decision) -> Self {
        let (key, value) = match decision {
            Decision::Authorized => ("user", "authorized"),
            Decision::Denied(denial) => ("error", denial.public_message()),
        };
        AuthorizerResponse {
            is_authorized: decision.is_authorized(),
            context: BTreeMap::from([(key.to_string(), value.to_string())]),
        }
    }
}

pub struct Authorizer<K> {
    store: K,
    config: AuthorizerConfig,
}

impl<K: KeyStore> Authorizer<K> {
    pub fn new(store: K, config: AuthorizerConfig) -> Self {
        Self { store, config }
    }

    /// Decides whether `request` may reach the webhook route.
    ///
    /// `budget` bounds the secret fetch; `None` leaves it unbounded.
    #[tracing::instrument(
        skip_all,
        fields(route = request.route_key.as_deref().unwrap_or(""))
    )]
    pub async fn authorize(
        &self,
        request: &AuthorizerRequest,
        budget: Option<Duration>,
    ) -> Decision {
        let decision = self.decide(request, budget).await;
        match decision {
            Decision::Authorized => info!(reason = decision.reason(), "Request authorized"),
            Decision::Denied(_) => warn!(reason = decision.reason(), "Request denied"),
        }
        decision
    }

    async fn decide(&self, request: &AuthorizerRequest, budget: Option<Duration>) -> Decision {
        let token = match request.header(&self.config.identity_header) {
            Some(token) if !token.is_empty() => token,
            _ => return Decision::Denied(Denial::MissingToken),
        };

        let Some(param) = self.config.secret_param.as_deref().filter(|p| !p.is_empty()) else {
            error!(
                header = %self.config.identity_header,
                "Secret parameter name is not configured (TELEGRAM_SECRET_PARAM)"
            );
            return Decision::Denied(Denial::ConfigError);
        };

        let fetched = match budget {
            Some(budget) => match tokio::time::timeout(budget, self.store.get(param)).await {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!(
                    "secret fetch timed out after {} ms",
                    budget.as_millis()
                )),
            },
            None => self.store.get(param).await,
        };

        let secret = match fetched {
            Ok(secret) => secret,
            Err(e) => {
                error!(parameter = param, error = %format!("{e:#}"), "Secret fetch failed");
                return Decision::Denied(Denial::FetchError);
            }
        };

        if tokens_match(token.as_bytes(), secret.as_bytes()) {
            Decision::Authorized
        } else {
            Decision::Denied(Denial::InvalidToken)
        }
    }
}

/// Exact byte equality that inspects every byte of the expected value
/// regardless of where the first difference is.
fn tokens_match(provided: &[u8], expected: &[u8]) -> bool {
    let mut diff = provided.len() ^ expected.len();
    for (i, byte) in expected.iter().enumerate() {
        let other = provided.get(i).copied().unwrap_or(!byte);
        diff |= usize::from(byte ^ other);
    }
    diff == 0
}

/// Time left before `deadline_ms` (milliseconds since the Unix epoch), minus
/// [`DEADLINE_MARGIN`]. Returns zero once the deadline is past.
pub fn remaining_budget(deadline_ms: u64, now: SystemTime) -> Duration {
    let deadline = UNIX_EPOCH + Duration::from_millis(deadline_ms);
    deadline
        .duration_since(now)
        .unwrap_or_default()
        .saturating_sub(DEADLINE_MARGIN)
}
