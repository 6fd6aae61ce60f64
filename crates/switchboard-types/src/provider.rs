//! Provider trait for the inference endpoint.

use crate::{ApiError, CreateMessageRequest, CreateMessageResponse};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`Provider::create_message`].
pub type ProviderFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CreateMessageResponse, ApiError>> + Send + 'a>>;

/// A hosted model that answers a message list with an ordered list of
/// content blocks.
///
/// Dyn-compatible so the orchestrator can hold an `Arc<dyn Provider>`.
pub trait Provider: Send + Sync {
    /// Send one request and wait for the complete response.
    fn create_message<'a>(&'a self, request: &'a CreateMessageRequest) -> ProviderFuture<'a>;

    /// Provider name for logging (e.g., "anthropic").
    fn name(&self) -> &str;
}
