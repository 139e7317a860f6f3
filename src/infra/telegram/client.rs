use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::models::{
    ApiResponse, DeleteWebhookRequest, Message, SendMessageRequest, SetWebhookRequest,
    WebhookInfo,
};
use crate::fetch::{HttpClient, json_request};

pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

/// Failure talking to the Bot API.
///
/// Messages never include the request URL, which carries the bot token.
#[derive(Debug, thiserror::Error)]
pub enum BotApiError {
    #[error("invalid Bot API base URL: {0}")]
    BaseUrl(String),
    #[error("failed to encode {method} request: {source}")]
    Encode {
        method: &'static str,
        source: serde_json::Error,
    },
    #[error("{method} request failed: {source}")]
    Transport {
        method: &'static str,
        source: reqwest::Error,
    },
    #[error("{method} returned HTTP {status}: {description}")]
    Status {
        method: &'static str,
        status: u16,
        description: String,
    },
    #[error("{method} rejected by Telegram: {description}")]
    Api {
        method: &'static str,
        code: Option<i64>,
        description: String,
    },
    #[error("failed to decode {method} response: {source}")]
    Decode {
        method: &'static str,
        source: reqwest::Error,
    },
}

/// Bot API client bound to one bot token.
pub struct TelegramClient<C> {
    http: C,
    base_url: String,
    token: String,
}

impl<C: HttpClient> TelegramClient<C> {
    pub fn new(http: C, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub async fn send_message(&self, req: &SendMessageRequest) -> Result<Message, BotApiError> {
        self.call("sendMessage", req).await
    }

    pub async fn set_webhook(&self, req: &SetWebhookRequest) -> Result<bool, BotApiError> {
        self.call("setWebhook", req).await
    }

    pub async fn delete_webhook(&self, req: &DeleteWebhookRequest) -> Result<bool, BotApiError> {
        self.call("deleteWebhook", req).await
    }

    pub async fn get_webhook_info(&self) -> Result<WebhookInfo, BotApiError> {
        self.call("getWebhookInfo", &serde_json::json!({})).await
    }

    /// Posts `body` to `method` and unwraps the `{ok, result}` envelope.
    #[tracing::instrument(skip(self, body))]
    pub async fn call<B, T>(&self, method: &'static str, body: &B) -> Result<T, BotApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.method_url(method)?;
        let req = json_request(reqwest::Method::POST, url, body)
            .map_err(|source| BotApiError::Encode { method, source })?;

        let response = self
            .http
            .execute(req)
            .await
            .map_err(|e| BotApiError::Transport {
                method,
                source: e.without_url(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let description = serde_json::from_str::<ApiResponse<serde_json::Value>>(&body)
                .ok()
                .and_then(|r| r.description)
                .unwrap_or(body);
            warn!(status = status.as_u16(), %description, "Bot API returned error status");
            return Err(BotApiError::Status {
                method,
                status: status.as_u16(),
                description,
            });
        }

        let envelope: ApiResponse<T> = response.json().await.map_err(|e| BotApiError::Decode {
            method,
            source: e.without_url(),
        })?;

        if !envelope.ok {
            let description = envelope.description.unwrap_or_default();
            warn!(code = ?envelope.error_code, %description, "Bot API reported failure");
            return Err(BotApiError::Api {
                method,
                code: envelope.error_code,
                description,
            });
        }

        debug!("Bot API call succeeded");
        envelope.result.ok_or_else(|| BotApiError::Api {
            method,
            code: None,
            description: "response has no result".to_string(),
        })
    }

    fn method_url(&self, method: &str) -> Result<reqwest::Url, BotApiError> {
        reqwest::Url::parse(&format!("{}/bot{}/{}", self.base_url, self.token, method))
            .map_err(|e| BotApiError::BaseUrl(format!("{} ({e})", self.base_url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CannedHttp;

    const SENT: &str = r#"{
        "ok": true,
        "result": { "message_id": 9, "date": 1700000000, "chat": { "id": 42, "type": "private" } }
    }"#;

    #[tokio::test]
    async fn test_send_message_posts_to_token_url() {
        let http = CannedHttp::new(200, SENT);
        let client = TelegramClient::new(&http, "https://api.example.org/", "123:abc");

        let msg = client
            .send_message(&SendMessageRequest::new(42, "hola"))
            .await
            .unwrap();

        assert_eq!(msg.message_id, 9);
        let requests = http.requests.lock().unwrap();
        assert_eq!(
            requests[0].0,
            "https://api.example.org/bot123:abc/sendMessage"
        );
        let sent: serde_json::Value = serde_json::from_slice(&requests[0].1).unwrap();
        assert_eq!(sent, serde_json::json!({ "chat_id": 42, "text": "hola" }));
    }

    #[tokio::test]
    async fn test_non_success_status_uses_description() {
        let http = CannedHttp::new(
            403,
            r#"{
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot was blocked by the user"
            }"#,
        );
        let client = TelegramClient::new(&http, DEFAULT_API_BASE_URL, "t");

        let err = client
            .send_message(&SendMessageRequest::new(1, "x"))
            .await
            .unwrap_err();

        match err {
            BotApiError::Status {
                status,
                description,
                ..
            } => {
                assert_eq!(status, 403);
                assert_eq!(description, "Forbidden: bot was blocked by the user");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_ok_false_is_api_error() {
        let http = CannedHttp::new(
            200,
            r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#,
        );
        let client = TelegramClient::new(&http, DEFAULT_API_BASE_URL, "t");

        let err = client
            .send_message(&SendMessageRequest::new(1, "x"))
            .await
            .unwrap_err();

        assert!(matches!(err, BotApiError::Api { code: Some(400), .. }));
    }

    #[tokio::test]
    async fn test_garbage_body_is_decode_error() {
        let http = CannedHttp::new(200, "<html>bad gateway</html>");
        let client = TelegramClient::new(&http, DEFAULT_API_BASE_URL, "t");

        let err = client.get_webhook_info().await.unwrap_err();

        assert!(matches!(err, BotApiError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_set_webhook_sends_secret_token() {
        let http = CannedHttp::new(
            200,
            r#"{"ok":true,"result":true,"description":"Webhook was set"}"#,
        );
        let client = TelegramClient::new(&http, DEFAULT_API_BASE_URL, "t");

        let done = client
            .set_webhook(&SetWebhookRequest {
                url: "https://hooks.example.org/webhook".to_string(),
                secret_token: Some("s3cr3t".to_string()),
                max_connections: None,
                allowed_updates: vec!["message".to_string()],
                drop_pending_updates: false,
            })
            .await
            .unwrap();

        assert!(done);
        let requests = http.requests.lock().unwrap();
        assert!(requests[0].0.ends_with("/setWebhook"));
        let sent: serde_json::Value = serde_json::from_slice(&requests[0].1).unwrap();
        assert_eq!(sent["secret_token"], "s3cr3t");
        assert_eq!(sent["allowed_updates"], serde_json::json!(["message"]));
        assert!(sent.get("drop_pending_updates").is_none());
    }

    #[test]
    fn test_status_error_display() {
        let err = BotApiError::Status {
            method: "sendMessage",
            status: 401,
            description: "Unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "sendMessage returned HTTP 401: Unauthorized");
    }
}
