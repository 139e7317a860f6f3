//! Telegram webhook authorizer and message relay for AWS Lambda.
//!
//! The gateway calls [`authorizer::Authorizer`] for every webhook delivery;
//! the bot workflow calls [`relay::MessageRelay`] to answer. Both read their
//! secrets through [`infra::keys::KeyStore`], whose SSM implementation takes its
//! client from the process-wide [`infra::registry::ClientRegistry`].

pub mod authorizer;
pub mod config;
pub mod fetch;
pub mod infra;
pub mod relay;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_support;
