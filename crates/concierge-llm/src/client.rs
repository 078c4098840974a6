// Claude API streaming client using reqwest-eventsource.
//
// Sends the conversation plus tool definitions to the Anthropic Messages API
// with `stream: true` and parses the Server-Sent Events into `LlmEvent`
// variants forwarded over an mpsc channel. Tool-use blocks are assembled from
// their `input_json_delta` fragments and emitted once complete.

use std::collections::HashMap;

use async_trait::async_trait;
use concierge_core::config::Config;
use futures_util::StreamExt;
use reqwest_eventsource::{Event, RequestBuilderExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::protocol::{to_anthropic_messages, to_anthropic_tools, ChatMessage, LlmEvent, ToolDefinition};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// ---------------------------------------------------------------------------
// ChatModel seam
// ---------------------------------------------------------------------------

/// One streamed model turn. Implementations send zero or more `TextDelta` /
/// `ToolCall` events followed by exactly one `Complete` or `Error`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn stream_turn(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        max_tokens: u32,
        tx: mpsc::Sender<LlmEvent>,
    ) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// ClaudeClient
// ---------------------------------------------------------------------------

/// Low-level Claude API streaming client.
pub struct ClaudeClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    api_url: String,
}

/// A tool_use block whose input JSON is still arriving.
#[derive(Debug, Default)]
struct PendingToolCall {
    id: String,
    name: String,
    input_json: String,
}

impl ClaudeClient {
    /// Create a new client with the given API key and model identifier.
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
            api_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    /// Point the client at a different Messages endpoint (proxies, tests).
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Stream one model turn over `tx`.
    ///
    /// Returns when the stream is complete, an error occurs, or the receiver
    /// is dropped. Failures are reported as `LlmEvent::Error`, not as `Err`.
    pub async fn stream_message(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        max_tokens: u32,
        tx: mpsc::Sender<LlmEvent>,
    ) -> anyhow::Result<()> {
        if self.api_key.is_empty() {
            let _ = tx
                .send(LlmEvent::Error {
                    message: "API key not configured".to_string(),
                })
                .await;
            return Ok(());
        }

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "stream": true,
            "system": system,
            "messages": to_anthropic_messages(messages),
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(to_anthropic_tools(tools));
        }

        let request = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        let mut es = match request.eventsource() {
            Ok(es) => es,
            Err(e) => {
                let _ = tx
                    .send(LlmEvent::Error {
                        message: format!("Failed to create event source: {e}"),
                    })
                    .await;
                return Ok(());
            }
        };

        let mut pending: HashMap<u64, PendingToolCall> = HashMap::new();
        let mut produced_output = false;
        let mut stop_reason: Option<String> = None;
        let mut input_tokens: u32 = 0;
        let mut output_tokens: u32 = 0;

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => {
                    debug!("SSE connection opened");
                }
                Ok(Event::Message(msg)) => {
                    let event_type = msg.event.as_str();
                    let data = &msg.data;

                    let outgoing = match event_type {
                        "message_start" => {
                            match parse_input_tokens(data) {
                                Some(n) => input_tokens = n,
                                None => warn!("failed to parse input_tokens from message_start"),
                            }
                            debug!(input_tokens, "message_start");
                            None
                        }
                        "content_block_start" => {
                            if let Some((index, id, name)) = parse_tool_use_start(data) {
                                debug!(index, %name, "tool_use block started");
                                pending.insert(
                                    index,
                                    PendingToolCall {
                                        id,
                                        name,
                                        input_json: String::new(),
                                    },
                                );
                            }
                            None
                        }
                        "content_block_delta" => {
                            if let Some((index, fragment)) = parse_input_json_delta(data) {
                                if let Some(call) = pending.get_mut(&index) {
                                    call.input_json.push_str(&fragment);
                                }
                                None
                            } else {
                                parse_delta_text(data).map(|text| LlmEvent::TextDelta { text })
                            }
                        }
                        "content_block_stop" => parse_block_index(data)
                            .and_then(|index| pending.remove(&index))
                            .map(finish_tool_call),
                        "message_delta" => {
                            match parse_output_tokens(data) {
                                Some(n) => output_tokens = n,
                                None => warn!("failed to parse output_tokens from message_delta"),
                            }
                            if let Some(reason) = parse_stop_reason(data) {
                                stop_reason = Some(reason);
                            }
                            debug!(output_tokens, ?stop_reason, "message_delta");
                            None
                        }
                        "message_stop" => {
                            debug!("message_stop, streaming complete");
                            let _ = tx
                                .send(LlmEvent::Complete {
                                    stop_reason,
                                    input_tokens,
                                    output_tokens,
                                })
                                .await;
                            es.close();
                            return Ok(());
                        }
                        "error" => {
                            let message = parse_api_error(data)
                                .unwrap_or_else(|| "API reported an error".to_string());
                            warn!(%message, "error event in stream");
                            let _ = tx.send(LlmEvent::Error { message }).await;
                            es.close();
                            return Ok(());
                        }
                        // ping and unknown events
                        _ => {
                            debug!(event_type, "ignoring SSE event");
                            None
                        }
                    };

                    if let Some(out) = outgoing {
                        produced_output = true;
                        if tx.send(out).await.is_err() {
                            // Receiver dropped, abort stream.
                            es.close();
                            return Ok(());
                        }
                    }
                }
                Err(err) => {
                    warn!(?err, "SSE stream error");
                    let error_message = extract_error_message(&err);
                    let _ = tx
                        .send(LlmEvent::Error {
                            message: error_message,
                        })
                        .await;
                    es.close();
                    return Ok(());
                }
            }
        }

        // Stream ended without message_stop.
        let final_event = if produced_output {
            LlmEvent::Complete {
                stop_reason,
                input_tokens,
                output_tokens,
            }
        } else {
            LlmEvent::Error {
                message: "Stream ended unexpectedly without any content".to_string(),
            }
        };
        let _ = tx.send(final_event).await;

        Ok(())
    }
}

fn finish_tool_call(call: PendingToolCall) -> LlmEvent {
    let input = if call.input_json.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(&call.input_json).unwrap_or_else(|e| {
            warn!(tool = %call.name, "tool input is not valid JSON: {e}");
            Value::Object(Default::default())
        })
    };
    LlmEvent::ToolCall {
        id: call.id,
        name: call.name,
        input,
    }
}

#[async_trait]
impl ChatModel for ClaudeClient {
    async fn stream_turn(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        max_tokens: u32,
        tx: mpsc::Sender<LlmEvent>,
    ) -> anyhow::Result<()> {
        self.stream_message(system, messages, tools, max_tokens, tx)
            .await
    }
}

// ---------------------------------------------------------------------------
// LlmClient wrapper
// ---------------------------------------------------------------------------

/// High-level wrapper that can be either an active Claude client or disabled.
pub enum LlmClient {
    /// Claude API is configured and ready.
    Active(ClaudeClient),
    /// LLM functionality is disabled (no API key configured).
    Disabled,
}

impl LlmClient {
    /// `Active` if an Anthropic API key is present, otherwise `Disabled`.
    pub fn from_config(config: &Config) -> Self {
        match &config.credentials.anthropic_api_key {
            Some(key) if !key.is_empty() => {
                LlmClient::Active(ClaudeClient::new(key.clone(), config.llm.model.clone()))
            }
            _ => LlmClient::Disabled,
        }
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn stream_turn(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        max_tokens: u32,
        tx: mpsc::Sender<LlmEvent>,
    ) -> anyhow::Result<()> {
        match self {
            LlmClient::Active(client) => {
                client
                    .stream_message(system, messages, tools, max_tokens, tx)
                    .await
            }
            LlmClient::Disabled => {
                let _ = tx
                    .send(LlmEvent::Error {
                        message: "LLM not configured".to_string(),
                    })
                    .await;
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SSE JSON parsing helpers
// ---------------------------------------------------------------------------

/// Extract `input_tokens` from a `message_start` event's JSON.
///
/// Expected shape: `{ "type": "message_start", "message": { "usage": { "input_tokens": N } } }`
pub(crate) fn parse_input_tokens(data: &str) -> Option<u32> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("message")?
        .get("usage")?
        .get("input_tokens")?
        .as_u64()
        .map(|n| n as u32)
}

/// Extract `delta.text` from a `content_block_delta` event's JSON.
///
/// Expected shape: `{ "type": "content_block_delta", "delta": { "type": "text_delta", "text": "..." } }`
pub(crate) fn parse_delta_text(data: &str) -> Option<String> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("delta")?
        .get("text")?
        .as_str()
        .map(|s| s.to_string())
}

/// Extract `(index, partial_json)` from an `input_json_delta`.
///
/// Expected shape: `{ "index": 1, "delta": { "type": "input_json_delta", "partial_json": "..." } }`
pub(crate) fn parse_input_json_delta(data: &str) -> Option<(u64, String)> {
    let v: Value = serde_json::from_str(data).ok()?;
    let delta = v.get("delta")?;
    if delta.get("type")?.as_str()? != "input_json_delta" {
        return None;
    }
    let fragment = delta.get("partial_json")?.as_str()?.to_string();
    Some((v.get("index")?.as_u64()?, fragment))
}

/// Extract `(index, id, name)` from a `content_block_start` that opens a
/// tool_use block. Text blocks yield `None`.
pub(crate) fn parse_tool_use_start(data: &str) -> Option<(u64, String, String)> {
    let v: Value = serde_json::from_str(data).ok()?;
    let block = v.get("content_block")?;
    if block.get("type")?.as_str()? != "tool_use" {
        return None;
    }
    Some((
        v.get("index")?.as_u64()?,
        block.get("id")?.as_str()?.to_string(),
        block.get("name")?.as_str()?.to_string(),
    ))
}

pub(crate) fn parse_block_index(data: &str) -> Option<u64> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("index")?.as_u64()
}

/// Extract `output_tokens` from a `message_delta` event's JSON.
///
/// Expected shape: `{ "type": "message_delta", "usage": { "output_tokens": N } }`
pub(crate) fn parse_output_tokens(data: &str) -> Option<u32> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("usage")?
        .get("output_tokens")?
        .as_u64()
        .map(|n| n as u32)
}

/// Extract `delta.stop_reason` from a `message_delta` event's JSON.
pub(crate) fn parse_stop_reason(data: &str) -> Option<String> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("delta")?
        .get("stop_reason")?
        .as_str()
        .map(|s| s.to_string())
}

/// Extract `error.message` from an in-stream `error` event.
pub(crate) fn parse_api_error(data: &str) -> Option<String> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("error")?
        .get("message")?
        .as_str()
        .map(|s| s.to_string())
}

/// Extract a human-readable error message from an SSE error.
fn extract_error_message(err: &reqwest_eventsource::Error) -> String {
    match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, _response) => {
            format!("API returned status {status}")
        }
        reqwest_eventsource::Error::Transport(e) => {
            format!("Network error: {e}")
        }
        other => format!("Stream error: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
