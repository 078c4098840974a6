// Chat orchestration: stream model turns, run requested tools, repeat.
//
// Each request runs at most `max_steps` model turns. A turn streams text and
// tool calls to the caller as they arrive; when the model asked for tools
// they are executed in order, their results are streamed and appended to the
// conversation, and the next turn starts.

use concierge_core::config::LlmConfig;
use concierge_llm::{ChatMessage, ChatModel, ContentPart, LlmEvent, Role};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::tools::ToolRegistry;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Incremental output of one chat request, in stream order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    TextDelta {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        id: String,
        name: String,
        output: Value,
        is_error: bool,
    },
    /// Terminal event. `reason` is the model's stop reason, or `max_steps`
    /// when the turn cap ended the exchange.
    Finish {
        reason: String,
        steps: usize,
    },
    /// Terminal event.
    Error {
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub max_steps: usize,
    pub max_tokens: u32,
}

impl From<&LlmConfig> for ChatSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            max_steps: config.max_steps,
            max_tokens: config.max_tokens,
        }
    }
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// What one streamed turn produced.
#[derive(Debug, Default)]
struct TurnOutput {
    text: String,
    tool_calls: Vec<(String, String, Value)>,
    stop_reason: Option<String>,
    failed: bool,
    receiver_closed: bool,
}

/// Run one chat request to completion, streaming [`ChatEvent`]s over `out`.
///
/// Always ends with exactly one `Finish` or `Error` event unless `out` is
/// closed first, in which case the loop stops at the next event boundary.
pub async fn run_chat(
    model: &dyn ChatModel,
    registry: &ToolRegistry,
    system: &str,
    mut messages: Vec<ChatMessage>,
    settings: &ChatSettings,
    out: &mpsc::Sender<ChatEvent>,
) {
    if !matches!(messages.last(), Some(m) if m.role == Role::User) {
        let _ = out
            .send(ChatEvent::Error {
                message: "conversation must end with a user message".to_string(),
            })
            .await;
        return;
    }

    let tools = registry.definitions();
    info!(
        messages = messages.len(),
        max_steps = settings.max_steps,
        "chat request"
    );

    for step in 1..=settings.max_steps {
        let (tx, rx) = mpsc::channel(64);
        let (result, turn) = tokio::join!(
            model.stream_turn(system, &messages, &tools, settings.max_tokens, tx),
            forward_turn(rx, out),
        );

        if turn.receiver_closed {
            debug!(step, "client went away mid-turn");
            return;
        }
        if let Err(e) = result {
            warn!(step, "model turn failed: {e:#}");
            let _ = out
                .send(ChatEvent::Error {
                    message: format!("{e:#}"),
                })
                .await;
            return;
        }
        if turn.failed {
            return;
        }

        let mut content = Vec::new();
        if !turn.text.is_empty() {
            content.push(ContentPart::Text { text: turn.text });
        }
        for (id, name, input) in &turn.tool_calls {
            content.push(ContentPart::ToolCall {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            });
        }
        messages.push(ChatMessage::assistant(content));

        if turn.tool_calls.is_empty() {
            let reason = turn.stop_reason.unwrap_or_else(|| "end_turn".to_string());
            info!(step, %reason, "chat finished");
            let _ = out.send(ChatEvent::Finish { reason, steps: step }).await;
            return;
        }

        let mut results = Vec::with_capacity(turn.tool_calls.len());
        for (id, name, input) in turn.tool_calls {
            let outcome = registry.execute(&name, &input).await;
            let event = ChatEvent::ToolResult {
                id: id.clone(),
                name: name.clone(),
                output: outcome.output.clone(),
                is_error: outcome.is_error,
            };
            if out.send(event).await.is_err() {
                return;
            }
            results.push(ContentPart::ToolResult {
                tool_call_id: id,
                name,
                output: outcome.output,
                is_error: outcome.is_error,
            });
        }
        messages.push(ChatMessage {
            role: Role::User,
            content: results,
        });
    }

    info!(max_steps = settings.max_steps, "chat stopped at step limit");
    let _ = out
        .send(ChatEvent::Finish {
            reason: "max_steps".to_string(),
            steps: settings.max_steps,
        })
        .await;
}

/// Drain one turn's model events, forwarding the client-visible ones.
async fn forward_turn(mut rx: mpsc::Receiver<LlmEvent>, out: &mpsc::Sender<ChatEvent>) -> TurnOutput {
    let mut turn = TurnOutput::default();

    while let Some(event) = rx.recv().await {
        if turn.receiver_closed {
            // Keep draining so the model task can finish.
            continue;
        }
        let forwarded = match event {
            LlmEvent::TextDelta { text } => {
                turn.text.push_str(&text);
                Some(ChatEvent::TextDelta { text })
            }
            LlmEvent::ToolCall { id, name, input } => {
                debug!(tool = %name, "model requested tool");
                turn.tool_calls.push((id.clone(), name.clone(), input.clone()));
                Some(ChatEvent::ToolCall { id, name, input })
            }
            LlmEvent::Complete {
                stop_reason,
                input_tokens,
                output_tokens,
            } => {
                debug!(input_tokens, output_tokens, ?stop_reason, "turn complete");
                turn.stop_reason = stop_reason;
                None
            }
            LlmEvent::Error { message } => {
                warn!("model stream error: {message}");
                turn.failed = true;
                Some(ChatEvent::Error { message })
            }
        };
        if let Some(event) = forwarded {
            if out.send(event).await.is_err() {
                turn.receiver_closed = true;
            }
        }
    }

    turn
}
