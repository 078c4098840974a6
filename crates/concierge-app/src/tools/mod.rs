// Tools the chat model can call.
//
// Every tool declares a JSON input schema and returns a JSON object. Invalid
// input is rejected with a field-level error before any work is done.

use std::sync::Arc;

use async_trait::async_trait;
use concierge_core::repository::ListingRepository;
use concierge_llm::ToolDefinition;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::search::{ExternalSearchSettings, SearchProvider};

pub mod area;
pub mod external;
pub mod listings;

#[cfg(test)]
pub(crate) mod test_support;

pub use area::AreaInfoTool;
pub use external::{ResearchLocalAreaTool, SearchExternalListingsTool};
pub use listings::{GetAgentContactTool, GetListingDetailsTool, InitiateContactTool, SearchListingsTool};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum ToolError {
    #[error("invalid `{field}`: {message}")]
    InvalidInput { field: String, message: String },

    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

impl ToolError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ToolError::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// JSON shape returned to the model in place of a result.
    pub fn to_output(&self) -> Value {
        match self {
            ToolError::InvalidInput { field, message } => {
                json!({ "error": message, "field": field })
            }
            ToolError::UnknownTool(name) => json!({ "error": format!("Unknown tool: {name}") }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tool trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call the tool.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema of the tool's arguments.
    fn input_schema(&self) -> Value;

    /// Run the tool. Service failures are folded into the returned object;
    /// only invalid input is an `Err`.
    async fn execute(&self, args: &Value) -> Result<Value, ToolError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Result of dispatching one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub output: Value,
    pub is_error: bool,
}

/// Registered tools in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full concierge tool set.
    pub fn with_default_tools(
        listings: Arc<ListingRepository>,
        search: Option<Arc<dyn SearchProvider>>,
        settings: ExternalSearchSettings,
        area_name: &str,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchListingsTool::new(listings.clone())));
        registry.register(Box::new(GetListingDetailsTool::new(listings.clone())));
        registry.register(Box::new(GetAgentContactTool::new(listings.clone())));
        registry.register(Box::new(AreaInfoTool::new(listings.clone())));
        registry.register(Box::new(InitiateContactTool::new(listings)));
        registry.register(Box::new(SearchExternalListingsTool::new(
            search.clone(),
            settings,
        )));
        registry.register(Box::new(ResearchLocalAreaTool::new(search, area_name)));
        registry
    }

    /// Register a tool, replacing any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Dispatch a call. Always yields an outcome: unknown tools and invalid
    /// input come back as error objects for the model to read.
    pub async fn execute(&self, name: &str, args: &Value) -> ToolOutcome {
        let result = match self.tools.iter().find(|t| t.name() == name) {
            Some(tool) => tool.execute(args).await,
            None => Err(ToolError::UnknownTool(name.to_string())),
        };

        match result {
            Ok(output) => {
                debug!(tool = name, "tool call succeeded");
                ToolOutcome {
                    output,
                    is_error: false,
                }
            }
            Err(e) => {
                warn!(tool = name, "tool call rejected: {e}");
                ToolOutcome {
                    output: e.to_output(),
                    is_error: true,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

/// Field value, with JSON `null` treated as absent.
fn field<'a>(args: &'a Value, name: &str) -> Option<&'a Value> {
    args.get(name).filter(|v| !v.is_null())
}

pub(crate) fn require_object(args: &Value) -> Result<(), ToolError> {
    if args.is_object() {
        Ok(())
    } else {
        Err(ToolError::invalid("input", "expected a JSON object"))
    }
}

/// Non-blank string.
pub(crate) fn required_string(args: &Value, name: &str) -> Result<String, ToolError> {
    optional_string(args, name)?.ok_or_else(|| ToolError::invalid(name, "is required"))
}

/// String if present; blank strings count as absent.
pub(crate) fn optional_string(args: &Value, name: &str) -> Result<Option<String>, ToolError> {
    match field(args, name) {
        None => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(ToolError::invalid(name, "must be a string")),
    }
}

/// Non-negative number if present.
pub(crate) fn optional_number(args: &Value, name: &str) -> Result<Option<f64>, ToolError> {
    match field(args, name) {
        None => Ok(None),
        Some(v) => match v.as_f64() {
            Some(n) if n.is_finite() && n >= 0.0 => Ok(Some(n)),
            Some(_) => Err(ToolError::invalid(name, "must be a non-negative number")),
            None => Err(ToolError::invalid(name, "must be a number")),
        },
    }
}

/// One of `choices`, matched exactly.
pub(crate) fn required_choice(
    args: &Value,
    name: &str,
    choices: &[&'static str],
) -> Result<&'static str, ToolError> {
    let value = required_string(args, name)?;
    choices
        .iter()
        .copied()
        .find(|c| *c == value)
        .ok_or_else(|| ToolError::invalid(name, format!("must be one of: {}", choices.join(", "))))
}

pub(crate) fn optional_choice(
    args: &Value,
    name: &str,
    choices: &[&'static str],
) -> Result<Option<&'static str>, ToolError> {
    if optional_string(args, name)?.is_none() {
        return Ok(None);
    }
    required_choice(args, name, choices).map(Some)
}
