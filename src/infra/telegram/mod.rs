//! Telegram Bot API client and wire types.

mod client;
pub mod models;

pub use client::{BotApiError, DEFAULT_API_BASE_URL, TelegramClient};
