// Chat wire types shared by the browser protocol, the chat loop and the
// Anthropic client.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Conversation messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One part of a chat message. Tool calls and tool results travel inside the
/// conversation so the browser can replay a multi-step exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_call_id: String,
        name: String,
        output: Value,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    /// Accepts either a plain string or a list of parts on input.
    #[serde(deserialize_with = "string_or_parts")]
    pub content: Vec<ContentPart>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentPart::Text { text: text.into() }],
        }
    }

    pub fn assistant(content: Vec<ContentPart>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }
}

fn string_or_parts<'de, D>(deserializer: D) -> Result<Vec<ContentPart>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Content {
        Text(String),
        Parts(Vec<ContentPart>),
    }

    Ok(match Content::deserialize(deserializer)? {
        Content::Text(text) => vec![ContentPart::Text { text }],
        Content::Parts(parts) => parts,
    })
}

// ---------------------------------------------------------------------------
// Tool definitions
// ---------------------------------------------------------------------------

/// A tool as advertised to the model: name, description, JSON-schema input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

// ---------------------------------------------------------------------------
// Streaming events
// ---------------------------------------------------------------------------

/// Events produced while streaming a single model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmEvent {
    /// Incremental assistant text.
    TextDelta { text: String },
    /// A complete tool invocation (input JSON fully assembled).
    ToolCall { id: String, name: String, input: Value },
    /// The turn finished. `stop_reason` is `"tool_use"` when tools were requested.
    Complete {
        stop_reason: Option<String>,
        input_tokens: u32,
        output_tokens: u32,
    },
    Error { message: String },
}

// ---------------------------------------------------------------------------
// Anthropic Messages API conversion
// ---------------------------------------------------------------------------

/// Convert the conversation to Messages API `messages`.
///
/// Tool results always travel in a user message. When they appear inside an
/// assistant message they are split out into a following user message. Empty
/// text parts and empty messages are dropped since the API rejects them.
pub fn to_anthropic_messages(messages: &[ChatMessage]) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::new();

    for message in messages {
        let mut own_blocks = Vec::new();
        let mut result_blocks = Vec::new();

        for part in &message.content {
            match part {
                ContentPart::Text { text } if text.trim().is_empty() => {}
                ContentPart::Text { text } => {
                    own_blocks.push(json!({ "type": "text", "text": text }));
                }
                ContentPart::ToolCall { id, name, input } => {
                    let input = if input.is_object() { input.clone() } else { json!({}) };
                    let block = json!({ "type": "tool_use", "id": id, "name": name, "input": input });
                    if message.role == Role::Assistant {
                        own_blocks.push(block);
                    }
                }
                ContentPart::ToolResult {
                    tool_call_id,
                    output,
                    is_error,
                    ..
                } => {
                    let content = match output {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    let block = json!({
                        "type": "tool_result",
                        "tool_use_id": tool_call_id,
                        "content": content,
                        "is_error": is_error,
                    });
                    match message.role {
                        Role::User => own_blocks.push(block),
                        Role::Assistant => result_blocks.push(block),
                    }
                }
            }
        }

        push_blocks(&mut out, message.role, own_blocks);
        push_blocks(&mut out, Role::User, result_blocks);
    }

    out
}

/// Append blocks, merging into the previous message when the role repeats.
fn push_blocks(out: &mut Vec<Value>, role: Role, blocks: Vec<Value>) {
    if blocks.is_empty() {
        return;
    }
    let role_str = match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    if let Some(last) = out.last_mut() {
        if last["role"] == role_str {
            if let Some(content) = last["content"].as_array_mut() {
                content.extend(blocks);
                return;
            }
        }
    }
    out.push(json!({ "role": role_str, "content": blocks }));
}

pub fn to_anthropic_tools(tools: &[ToolDefinition]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.input_schema,
            })
        })
        .collect()
}
