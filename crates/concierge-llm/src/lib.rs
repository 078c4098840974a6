// LLM layer: chat wire types and the streaming Anthropic client behind the
// `ChatModel` trait.

pub mod client;
pub mod protocol;

pub use client::{ChatModel, ClaudeClient, LlmClient};
pub use protocol::{ChatMessage, ContentPart, LlmEvent, Role, ToolDefinition};
