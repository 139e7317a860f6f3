//! Shared fakes for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::fetch::HttpClient;
use crate::infra::keys::KeyStore;

/// Replies with a canned status and body, recording every request as `(url, body)`.
pub(crate) struct CannedHttp {
    status: u16,
    body: String,
    pub(crate) requests: Mutex<Vec<(String, Vec<u8>)>>,
}

impl CannedHttp {
    pub(crate) fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpClient for CannedHttp {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let body = req
            .body()
            .and_then(|b| b.as_bytes())
            .map(<[u8]>::to_vec)
            .unwrap_or_default();
        self.requests
            .lock()
            .unwrap()
            .push((req.url().to_string(), body));

        let response = http::Response::builder()
            .status(self.status)
            .header("content-type", "application/json")
            .body(self.body.clone())
            .unwrap();
        Ok(reqwest::Response::from(response))
    }
}

/// In-memory [`KeyStore`] that counts lookups and can fail or stall on demand.
#[derive(Default)]
pub(crate) struct MemoryKeyStore {
    values: HashMap<String, String>,
    fail_with: Option<String>,
    delay: Option<Duration>,
    fetches: AtomicUsize,
    decrypted: AtomicUsize,
}

impl MemoryKeyStore {
    pub(crate) fn with(name: &str, value: &str) -> Self {
        let mut values = HashMap::new();
        values.insert(name.to_string(), value.to_string());
        Self {
            values,
            ..Default::default()
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn decrypted_fetches(&self) -> usize {
        self.decrypted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn fetch(&self, name: &str, with_decryption: bool) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if with_decryption {
            self.decrypted.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.fail_with {
            anyhow::bail!("{message}");
        }
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("ParameterNotFound: {name}"))
    }
}
