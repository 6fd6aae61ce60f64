//! Anthropic Messages API client for Switchboard.

mod client;
mod provider;
mod retry;

pub use client::ApiClient;
pub use provider::AnthropicProvider;
pub use retry::RetryConfig;
