//! Secret resolution.
//!
//! [`KeyStore`] is the async trait for resolving a parameter name into its plaintext value.
//! [`SsmKeyStore`] implements [`KeyStore`] using AWS SSM Parameter Store, with its
//! client taken from the shared [`ClientRegistry`](crate::infra::registry::ClientRegistry).
//!
//! Values are never cached here: every call reads the store, so a rotated
//! secret is picked up by the next invocation.

mod ssm;

pub use ssm::SsmKeyStore;

use anyhow::Result;

/// Resolves a parameter name (e.g. an SSM parameter path) into its value.
#[async_trait::async_trait]
pub trait KeyStore: Send + Sync {
    async fn fetch(&self, name: &str, with_decryption: bool) -> Result<String>;

    /// Fetches `name` with decryption enabled.
    async fn get(&self, name: &str) -> Result<String> {
        self.fetch(name, true).await
    }
}

#[async_trait::async_trait]
impl<K: KeyStore + ?Sized> KeyStore for std::sync::Arc<K> {
    async fn fetch(&self, name: &str, with_decryption: bool) -> Result<String> {
        (**self).fetch(name, with_decryption).await
    }
}

#[async_trait::async_trait]
impl<'a, K: KeyStore + ?Sized> KeyStore for &'a K {
    async fn fetch(&self, name: &str, with_decryption: bool) -> Result<String> {
        (**self).fetch(name, with_decryption).await
    }
}
