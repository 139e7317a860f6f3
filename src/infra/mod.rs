//! Adapters for the remote services this crate talks to.

pub mod keys;
pub mod registry;
pub mod telegram;
