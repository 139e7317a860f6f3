//! Operator CLI for the Telegram webhook functions.
//!
//! Runs the same authorizer and relay code the Lambda functions use, against
//! the real parameter store, and manages the bot's webhook registration so the
//! secret token Telegram sends matches the one the authorizer expects.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::DateTime;
use clap::{Parser, Subcommand};
use telegram_webhook::authorizer::{Authorizer, AuthorizerRequest, AuthorizerResponse};
use telegram_webhook::config::{AuthorizerConfig, RelayConfig, SECRET_PARAM_VAR, TOKEN_PARAM_VAR};
use telegram_webhook::fetch::BasicClient;
use telegram_webhook::infra::keys::{KeyStore, SsmKeyStore};
use telegram_webhook::infra::registry::{AwsConfigLoader, ClientRegistry};
use telegram_webhook::infra::telegram::TelegramClient;
use telegram_webhook::infra::telegram::models::{DeleteWebhookRequest, SetWebhookRequest};
use telegram_webhook::relay::{MessageRelay, SendMessageInput};
use telegram_webhook::telemetry;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "telegram_webhook")]
#[command(about = "Exercise the Telegram webhook authorizer and relay locally", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the authorizer decision for a token and print the gateway response
    Authorize {
        /// Value of the identity header; omit to simulate a missing header
        #[arg(long)]
        token: Option<String>,

        /// SSM parameter holding the expected secret
        #[arg(long, env = SECRET_PARAM_VAR)]
        secret_param: Option<String>,
    },
    /// Send a text message through the relay
    SendMessage {
        #[arg(long, allow_hyphen_values = true)]
        chat_id: i64,

        #[arg(long)]
        text: String,

        /// Telegram parse mode (HTML, MarkdownV2)
        #[arg(long)]
        parse_mode: Option<String>,

        /// SSM parameter holding the bot token
        #[arg(long, env = TOKEN_PARAM_VAR)]
        token_param: Option<String>,
    },
    /// Register the webhook URL together with the stored secret token
    SetWebhook {
        /// Public URL of the webhook route (e.g. https://.../webhook)
        #[arg(long)]
        url: String,

        #[arg(long, env = TOKEN_PARAM_VAR)]
        token_param: String,

        #[arg(long, env = SECRET_PARAM_VAR)]
        secret_param: String,

        /// Update types to receive (repeatable); empty keeps Telegram's default
        #[arg(long = "allowed-update")]
        allowed_updates: Vec<String>,

        #[arg(long, default_value_t = false)]
        drop_pending_updates: bool,
    },
    /// Show the webhook Telegram currently delivers to
    WebhookInfo {
        #[arg(long, env = TOKEN_PARAM_VAR)]
        token_param: String,
    },
    /// Remove the webhook registration
    DeleteWebhook {
        #[arg(long, env = TOKEN_PARAM_VAR)]
        token_param: String,

        #[arg(long, default_value_t = false)]
        drop_pending_updates: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = telemetry::init_cli();

    let cli = Cli::parse();

    let registry = Arc::new(ClientRegistry::new(AwsConfigLoader));
    let keys = SsmKeyStore::new(registry);

    match cli.command {
        Commands::Authorize {
            token,
            secret_param,
        } => {
            let mut config = AuthorizerConfig::from_env();
            config.secret_param = secret_param.filter(|p| !p.is_empty());

            let mut headers = HashMap::new();
            if let Some(token) = token {
                headers.insert(config.identity_header.clone(), token);
            }
            let request = AuthorizerRequest {
                headers,
                ..Default::default()
            };

            let authorizer = Authorizer::new(keys, config);
            let response = AuthorizerResponse::from(authorizer.authorize(&request, None).await);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::SendMessage {
            chat_id,
            text,
            parse_mode,
            token_param,
        } => {
            let mut config = RelayConfig::from_env();
            config.token_param = token_param.filter(|p| !p.is_empty());

            let http = BasicClient::with_timeouts(config.http_timeout, config.connect_timeout)?;
            let relay = MessageRelay::new(http, keys, config);
            let output = relay
                .send(&SendMessageInput {
                    chat_id,
                    text,
                    parse_mode,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::SetWebhook {
            url,
            token_param,
            secret_param,
            allowed_updates,
            drop_pending_updates,
        } => {
            let secret = keys
                .get(&secret_param)
                .await
                .context("failed to read webhook secret token")?;
            if !is_valid_secret_token(&secret) {
                anyhow::bail!(
                    "secret stored in '{secret_param}' is not a valid Telegram secret token \
                     (1-256 characters of A-Z, a-z, 0-9, '_' and '-')"
                );
            }

            let client = bot_client(&keys, &token_param).await?;
            client
                .set_webhook(&SetWebhookRequest {
                    url: url.clone(),
                    secret_token: Some(secret),
                    max_connections: None,
                    allowed_updates,
                    drop_pending_updates,
                })
                .await?;
            info!(%url, "Webhook registered");
        }
        Commands::WebhookInfo { token_param } => {
            let client = bot_client(&keys, &token_param).await?;
            let webhook = client.get_webhook_info().await?;

            if webhook.url.is_empty() {
                warn!("No webhook registered");
            }
            let last_error_at = webhook
                .last_error_date
                .and_then(|ts| DateTime::from_timestamp(ts, 0))
                .map(|dt| dt.to_rfc3339());
            info!(
                url = %webhook.url,
                pending_update_count = webhook.pending_update_count,
                max_connections = ?webhook.max_connections,
                allowed_updates = ?webhook.allowed_updates,
                last_error_at = ?last_error_at,
                last_error_message = ?webhook.last_error_message,
                "Webhook info"
            );
        }
        Commands::DeleteWebhook {
            token_param,
            drop_pending_updates,
        } => {
            let client = bot_client(&keys, &token_param).await?;
            client
                .delete_webhook(&DeleteWebhookRequest {
                    drop_pending_updates,
                })
                .await?;
            info!(drop_pending_updates, "Webhook removed");
        }
    }

    Ok(())
}

/// Builds a Bot API client with the token stored under `token_param`.
async fn bot_client(keys: &SsmKeyStore, token_param: &str) -> Result<TelegramClient<BasicClient>> {
    let config = RelayConfig::from_env();
    let token = keys
        .get(token_param)
        .await
        .context("failed to read bot token")?;
    let http = BasicClient::with_timeouts(config.http_timeout, config.connect_timeout)?;
    Ok(TelegramClient::new(http, config.api_base_url, token))
}

/// Telegram accepts 1-256 characters from `A-Z`, `a-z`, `0-9`, `_` and `-`.
fn is_valid_secret_token(token: &str) -> bool {
    (1..=256).contains(&token.len())
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}
