//! Anthropic Messages API provider implementation.

use crate::client::ApiClient;
use crate::retry::RetryConfig;
use switchboard_types::provider::{Provider, ProviderFuture};
use switchboard_types::{ApiError, CreateMessageRequest};

/// Anthropic Messages API provider.
///
/// Thin wrapper over [`ApiClient`]; retry logic stays in the client.
#[derive(Clone)]
pub struct AnthropicProvider {
    client: ApiClient,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, ApiError> {
        Ok(Self {
            client: ApiClient::new(api_key, base_url)?,
        })
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.client = self.client.with_retry_config(config);
        self
    }
}

impl Provider for AnthropicProvider {
    fn create_message<'a>(&'a self, request: &'a CreateMessageRequest) -> ProviderFuture<'a> {
        Box::pin(self.client.create_message(request))
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
