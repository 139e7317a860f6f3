//! Process-wide cache of remote-service clients.
//!
//! A [`ClientRegistry`] is created once at startup and shared (behind an
//! [`Arc`]) by every invocation the process serves. The first call to
//! [`ClientRegistry::get_or_init`] resolves the base configuration through a
//! [`ConfigLoader`]; each [`ClientKind`] is then constructed at most once from
//! that configuration and handed out as a shared [`Arc`] for the rest of the
//! process lifetime.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, error, info};

/// Logical type of a cached client, used as the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKind {
    /// AWS SSM Parameter Store client.
    ParameterStore,
    /// HTTP client used for Telegram Bot API calls.
    MessagingHttp,
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientKind::ParameterStore => f.write_str("parameter-store"),
            ClientKind::MessagingHttp => f.write_str("messaging-http"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Base configuration could not be resolved. Memoized: every later call
    /// fails with the same message.
    #[error("client configuration unavailable: {0}")]
    Config(String),
    #[error("failed to build '{kind}' client: {message}")]
    Build { kind: ClientKind, message: String },
    /// A handle of a different type is already cached under this kind.
    #[error("client cached under '{0}' has a different type than requested")]
    KindMismatch(ClientKind),
}

/// Resolves the base configuration shared by every client kind.
#[async_trait::async_trait]
pub trait ConfigLoader: Send + Sync {
    type Config: Send + Sync + 'static;

    async fn load(&self) -> Result<Self::Config>;
}

/// Loads the ambient AWS configuration (env vars, Lambda execution role, profile).
pub struct AwsConfigLoader;

#[async_trait::async_trait]
impl ConfigLoader for AwsConfigLoader {
    type Config = aws_config::SdkConfig;

    async fn load(&self) -> Result<Self::Config> {
        let config = aws_config::load_from_env().await;
        info!(region = ?config.region(), "AWS configuration loaded");
        Ok(config)
    }
}

type Handle = Arc<dyn Any + Send + Sync>;

pub struct ClientRegistry<L: ConfigLoader = AwsConfigLoader> {
    loader: L,
    config: OnceCell<std::result::Result<L::Config, String>>,
    entries: RwLock<HashMap<ClientKind, Handle>>,
}

impl<L: ConfigLoader> ClientRegistry<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            config: OnceCell::new(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the client cached under `kind`, building it with `build` if
    /// this is the first request for that kind.
    ///
    /// Concurrent first requests for the same kind construct exactly one
    /// client: the presence check is repeated after the exclusive lock is
    /// taken, so a caller that lost the race returns the winner's handle.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Config`] if the base configuration failed to load,
    /// [`RegistryError::KindMismatch`] if `kind` already holds another type.
    pub async fn get_or_init<T, F>(
        &self,
        kind: ClientKind,
        build: F,
    ) -> std::result::Result<Arc<T>, RegistryError>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&L::Config) -> T,
    {
        self.try_get_or_init(kind, |config| Ok(build(config))).await
    }

    /// Like [`get_or_init`](Self::get_or_init) for constructors that can fail.
    /// A failed construction caches nothing, so the next caller tries again.
    pub async fn try_get_or_init<T, F>(
        &self,
        kind: ClientKind,
        build: F,
    ) -> std::result::Result<Arc<T>, RegistryError>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&L::Config) -> Result<T>,
    {
        let config = self.config().await?;

        if let Some(handle) = self.entries.read().await.get(&kind) {
            return downcast(kind, handle.clone());
        }

        let mut entries = self.entries.write().await;
        if let Some(handle) = entries.get(&kind) {
            debug!(%kind, "client built by a concurrent caller");
            return downcast(kind, handle.clone());
        }

        let client = Arc::new(build(config).map_err(|e| RegistryError::Build {
            kind,
            message: format!("{e:#}"),
        })?);
        entries.insert(kind, client.clone() as Handle);
        info!(%kind, "client constructed");
        Ok(client)
    }

    /// Number of cached clients.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn config(&self) -> std::result::Result<&L::Config, RegistryError> {
        let resolved = self
            .config
            .get_or_init(|| async {
                self.loader.load().await.map_err(|e| {
                    error!(error = %format!("{e:#}"), "Client configuration failed to load");
                    format!("{e:#}")
                })
            })
            .await;

        resolved
            .as_ref()
            .map_err(|message| RegistryError::Config(message.clone()))
    }
}

fn downcast<T: Send + Sync + 'static>(
    kind: ClientKind,
    handle: Handle,
) -> std::result::Result<Arc<T>, RegistryError> {
    handle
        .downcast::<T>()
        .map_err(|_| RegistryError::KindMismatch(kind))
}
