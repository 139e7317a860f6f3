//! Message relay invoked by the bot workflow.
//!
//! Resolves the bot token from the parameter store, sends one `sendMessage`
//! call and reports the resulting message id. Unlike the authorizer, failures
//! are returned to the caller so the workflow can retry or fail the job.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::RelayConfig;
use crate::fetch::HttpClient;
use crate::infra::keys::KeyStore;
use crate::infra::telegram::models::SendMessageRequest;
use crate::infra::telegram::{BotApiError, TelegramClient};

/// Workflow task input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageInput {
    #[serde(rename = "ChatID")]
    pub chat_id: i64,
    #[serde(rename = "Text")]
    pub text: String,
    #[serde(rename = "ParseMode", default, skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<String>,
}

/// Workflow task output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageOutput {
    #[serde(rename = "Ok")]
    pub ok: bool,
    #[serde(rename = "MessageID", default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("bot token parameter is not configured (TELEGRAM_TOKEN_PARAM)")]
    Config,
    #[error("failed to resolve bot token: {0}")]
    Token(String),
    #[error(transparent)]
    Api(#[from] BotApiError),
}

pub struct MessageRelay<C, K> {
    http: C,
    keys: K,
    config: RelayConfig,
}

impl<C: HttpClient, K: KeyStore> MessageRelay<C, K> {
    pub fn new(http: C, keys: K, config: RelayConfig) -> Self {
        Self { http, keys, config }
    }

    /// Fetches the bot token. Read on every call so token rotation needs no redeploy.
    async fn token(&self) -> Result<String, RelayError> {
        let param = self.config.token_param.as_deref().ok_or(RelayError::Config)?;
        self.keys
            .get(param)
            .await
            .map_err(|e| RelayError::Token(format!("{e:#}")))
    }

    #[tracing::instrument(skip_all, fields(chat_id = input.chat_id))]
    pub async fn send(&self, input: &SendMessageInput) -> Result<SendMessageOutput, RelayError> {
        let token = self.token().await?;
        let client = TelegramClient::new(&self.http, self.config.api_base_url.as_str(), token);

        let request = SendMessageRequest::new(input.chat_id, input.text.clone())
            .with_parse_mode(input.parse_mode.clone());
        let message = client.send_message(&request).await?;

        info!(message_id = message.message_id, "Message sent");
        Ok(SendMessageOutput {
            ok: true,
            message_id: Some(message.message_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CannedHttp, MemoryKeyStore};
    use std::time::Duration;

    const TOKEN_PARAM: &str = "/em/TelegramToken";
    const SENT: &str = r#"{
        "ok": true,
        "result": {
            "message_id": 314,
            "date": 1700000000,
            "chat": { "id": 42, "type": "private" },
            "text": "hola"
        }
    }"#;

    fn config(token_param: Option<&str>) -> RelayConfig {
        RelayConfig {
            token_param: token_param.map(str::to_string),
            api_base_url: "https://api.example.org".to_string(),
            http_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(1),
        }
    }

    fn input(parse_mode: Option<&str>) -> SendMessageInput {
        SendMessageInput {
            chat_id: 42,
            text: "hola".to_string(),
            parse_mode: parse_mode.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_send_returns_message_id() {
        let http = CannedHttp::new(200, SENT);
        let keys = MemoryKeyStore::with(TOKEN_PARAM, "123:abc");
        let relay = MessageRelay::new(&http, &keys, config(Some(TOKEN_PARAM)));

        let out = relay.send(&input(Some("HTML"))).await.unwrap();

        assert_eq!(
            out,
            SendMessageOutput {
                ok: true,
                message_id: Some(314)
            }
        );
        assert_eq!(keys.decrypted_fetches(), 1);
        let requests = http.requests.lock().unwrap();
        assert_eq!(requests[0].0, "https://api.example.org/bot123:abc/sendMessage");
        let body: serde_json::Value = serde_json::from_slice(&requests[0].1).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "chat_id": 42, "text": "hola", "parse_mode": "HTML" })
        );
    }

    #[tokio::test]
    async fn test_missing_token_param_skips_http() {
        let http = CannedHttp::new(200, SENT);
        let keys = MemoryKeyStore::with(TOKEN_PARAM, "123:abc");
        let relay = MessageRelay::new(&http, &keys, config(None));

        let err = relay.send(&input(None)).await.unwrap_err();

        assert!(matches!(err, RelayError::Config));
        assert_eq!(keys.fetches(), 0);
        assert_eq!(http.calls(), 0);
    }

    #[tokio::test]
    async fn test_token_fetch_failure_propagates() {
        let http = CannedHttp::new(200, SENT);
        let keys = MemoryKeyStore::failing("ThrottlingException");
        let relay = MessageRelay::new(&http, &keys, config(Some(TOKEN_PARAM)));

        let err = relay.send(&input(None)).await.unwrap_err();

        assert!(matches!(err, RelayError::Token(ref msg) if msg.contains("ThrottlingException")));
        assert_eq!(http.calls(), 0);
    }

    #[tokio::test]
    async fn test_error_status_propagates_without_token() {
        let http = CannedHttp::new(
            401,
            r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#,
        );
        let keys = MemoryKeyStore::with(TOKEN_PARAM, "123:abc");
        let relay = MessageRelay::new(&http, &keys, config(Some(TOKEN_PARAM)));

        let err = relay.send(&input(None)).await.unwrap_err();

        assert!(matches!(
            err,
            RelayError::Api(BotApiError::Status { status: 401, .. })
        ));
        assert!(!err.to_string().contains("123:abc"));
    }

    #[tokio::test]
    async fn test_api_rejection_propagates() {
        let http = CannedHttp::new(
            200,
            r#"{"ok":false,"error_code":400,"description":"Bad Request: message text is empty"}"#,
        );
        let keys = MemoryKeyStore::with(TOKEN_PARAM, "123:abc");
        let relay = MessageRelay::new(&http, &keys, config(Some(TOKEN_PARAM)));

        let err = relay.send(&input(None)).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "sendMessage rejected by Telegram: Bad Request: message text is empty"
        );
    }

    #[test]
    fn test_input_wire_names() {
        let parsed: SendMessageInput =
            serde_json::from_str(r#"{"ChatID": -1001, "Text": "hi"}"#).unwrap();
        assert_eq!(parsed.chat_id, -1001);
        assert_eq!(parsed.parse_mode, None);

        let out = SendMessageOutput {
            ok: false,
            message_id: None,
        };
        assert_eq!(serde_json::to_value(&out).unwrap(), serde_json::json!({ "Ok": false }));
    }
}
