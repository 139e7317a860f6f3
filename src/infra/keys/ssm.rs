use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use super::KeyStore;
use crate::infra::registry::{AwsConfigLoader, ClientKind, ClientRegistry, ConfigLoader};

/// Resolves secrets from AWS SSM Parameter Store.
///
/// The SSM client is not owned by the store: it is requested from the shared
/// [`ClientRegistry`] on every call, so it is built on first use and reused
/// by every later invocation in the same process. `SecureString` values need
/// `ssm:GetParameter` plus `kms:Decrypt` on the parameter's key.
pub struct SsmKeyStore<L: ConfigLoader<Config = aws_config::SdkConfig> = AwsConfigLoader> {
    registry: Arc<ClientRegistry<L>>,
}

impl<L: ConfigLoader<Config = aws_config::SdkConfig>> SsmKeyStore<L> {
    pub fn new(registry: Arc<ClientRegistry<L>>) -> Self {
        Self { registry }
    }

    async fn client(&self) -> Result<Arc<aws_sdk_ssm::Client>> {
        let client = self
            .registry
            .get_or_init(ClientKind::ParameterStore, aws_sdk_ssm::Client::new)
            .await?;
        Ok(client)
    }
}

#[async_trait::async_trait]
impl<L: ConfigLoader<Config = aws_config::SdkConfig>> KeyStore for SsmKeyStore<L> {
    /// Fetches the parameter `name` (an SSM path such as
    /// `/em/TelegramSecretToken`) and returns its value.
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, name: &str, with_decryption: bool) -> Result<String> {
        if name.is_empty() {
            anyhow::bail!("SSM parameter name is empty");
        }

        let client = self.client().await?;
        let resp = client
            .get_parameter()
            .name(name)
            .with_decryption(with_decryption)
            .send()
            .await
            .with_context(|| format!("SSM GetParameter failed for '{name}'"))?;

        debug!("SSM parameter fetched");

        resp.parameter
            .and_then(|p| p.value)
            .ok_or_else(|| anyhow::anyhow!("SSM parameter '{name}' exists but has no value"))
    }
}
