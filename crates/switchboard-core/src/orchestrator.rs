//! Drives one user query through the model and any tools it asks for.

use crate::registry::ToolRegistry;
use std::sync::Arc;
use switchboard_mcp::{PoolError, ServerPool, ToolCallResult, ToolContent};
use switchboard_types::{
    ApiError, ContentBlock, CreateMessageRequest, CreateMessageResponse, ImageSource,
    ImageSourceType, Message, Provider, ToolDefinition, truncate_str,
};
use thiserror::Error;

/// Tool-call rounds per query. The continuation after a tool result only
/// carries the tool catalog while fewer rounds than this have run, so with 1
/// the model can never chain a second tool call.
pub const MAX_TOOL_ROUNDS: usize = 1;

/// Placeholder sent when a tool returns no usable content.
const EMPTY_RESULT_TEXT: &str = "(no output)";

/// Longest slice of tool output written to debug logs.
const LOG_PREVIEW_BYTES: usize = 200;

/// Anything that aborts a query partway.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Tool(#[from] PoolError),
}

/// Answers queries using a model provider and the session's tool servers.
pub struct Orchestrator<'a> {
    provider: Arc<dyn Provider>,
    registry: &'a ToolRegistry,
    pool: &'a ServerPool,
    model: String,
    max_tokens: u32,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: &'a ToolRegistry,
        pool: &'a ServerPool,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            provider,
            registry,
            pool,
            model: model.into(),
            max_tokens,
        }
    }

    /// Answer one query.
    ///
    /// The answer is every piece of output joined by newlines, in the order
    /// the model produced it. Failures never escape: the error is appended as
    /// a final `[Error processing query: ...]` line after whatever was
    /// produced before it.
    pub async fn process_query(&self, query: &str) -> String {
        let mut parts = Vec::new();
        if let Err(e) = self.run(query, &mut parts).await {
            tracing::error!("Query failed: {e}");
            parts.push(format!("[Error processing query: {e}]"));
        }
        parts.join("\n")
    }

    async fn run(&self, query: &str, parts: &mut Vec<String>) -> Result<(), QueryError> {
        let mut messages = vec![Message::user_text(query)];
        let catalog = self.registry.definitions();
        let tools = if catalog.is_empty() {
            None
        } else {
            Some(catalog)
        };

        let response = self.send(&messages, tools).await?;
        let mut rounds = 0;

        for block in response.content {
            match block {
                ContentBlock::Text { text } => parts.push(text),
                ContentBlock::ToolUse { name, input, .. } => {
                    let Some(index) = self.registry.resolve(&name) else {
                        tracing::warn!("Model asked for unknown tool '{name}'");
                        parts.push(format!(
                            "[Error: Tool {name} not found in any connected server]"
                        ));
                        continue;
                    };

                    tracing::info!("Calling tool '{name}' on server {}", index + 1);
                    let outcome = self.pool.invoke(index, &name, input.clone()).await;
                    parts.push(format!("[Called tool {name} with args {input}]"));
                    let result = outcome?;
                    tracing::debug!("Tool '{name}' returned: {}", result_preview(&result));

                    messages.push(Message::user(tool_result_blocks(result)));
                    rounds += 1;

                    let tools = if rounds < MAX_TOOL_ROUNDS {
                        Some(self.registry.definitions()).filter(|d| !d.is_empty())
                    } else {
                        None
                    };
                    let follow_up = self.send(&messages, tools).await?;
                    parts.push(
                        follow_up
                            .content
                            .first()
                            .and_then(ContentBlock::as_text)
                            .unwrap_or_default()
                            .to_string(),
                    );
                }
                ContentBlock::Image { .. } | ContentBlock::Other => {}
            }
        }
        Ok(())
    }

    async fn send(
        &self,
        messages: &[Message],
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<CreateMessageResponse, ApiError> {
        let request = CreateMessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: messages.to_vec(),
            tools,
        };
        tracing::debug!(
            "Sending {} messages to {} ({} tools)",
            request.messages.len(),
            self.provider.name(),
            request.tools.as_ref().map_or(0, Vec::len)
        );
        let response = self.provider.create_message(&request).await?;
        tracing::debug!(
            "Response {}: stop_reason={:?}, tokens in={} out={}",
            response.id,
            response.stop_reason,
            response.usage.input_tokens,
            response.usage.output_tokens
        );
        Ok(response)
    }
}

/// First text item of a tool result, cut short for logging.
fn result_preview(result: &ToolCallResult) -> &str {
    result
        .content
        .iter()
        .find_map(|item| match item {
            ToolContent::Text { text } => Some(truncate_str(text, LOG_PREVIEW_BYTES)),
            _ => None,
        })
        .unwrap_or(EMPTY_RESULT_TEXT)
}

/// Convert a tool result into the blocks of the user message that reports it.
fn tool_result_blocks(result: ToolCallResult) -> Vec<ContentBlock> {
    if result.is_error {
        tracing::warn!("Tool reported an error result");
    }
    let blocks: Vec<ContentBlock> = result
        .content
        .into_iter()
        .filter_map(|item| match item {
            ToolContent::Text { text } => Some(ContentBlock::Text { text }),
            ToolContent::Image { data, mime_type } => Some(ContentBlock::Image {
                source: ImageSource {
                    source_type: ImageSourceType::Base64,
                    media_type: mime_type,
                    data,
                },
            }),
            ToolContent::Unsupported => None,
        })
        .collect();

    if blocks.is_empty() {
        vec![ContentBlock::Text {
            text: EMPTY_RESULT_TEXT.to_string(),
        }]
    } else {
        blocks
    }
}
