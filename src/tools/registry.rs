//! Tool registry - uniform dispatch surface over the registered tools
//!
//! The registry owns the mapping from tool name to handler, advertises the
//! machine-readable schemas to the LLM, validates argument maps before the
//! handler runs, and wraps whatever happens into a [`ToolResult`] that always
//! carries the originating call id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::llm::{ToolCall, ToolDef, ToolFunction};
use crate::metrics::TOOL_CALLS;

use super::{Tool, ToolContext, ToolOutcome, ToolResult};

/// Registry of available tools, in registration order
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool schemas advertised to the LLM, in registration order
    pub fn schemas(&self) -> Vec<ToolDef> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolDef {
                tool_type: "function".to_string(),
                function: ToolFunction {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameters: tool.parameters(),
                },
            })
            .collect()
    }

    /// Names and descriptions, for the system prompt
    pub fn descriptions(&self) -> Vec<(String, String)> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| (t.name().to_string(), t.description().to_string()))
            .collect()
    }

    /// Dispatch one tool call and wrap the outcome
    ///
    /// Never returns an error: unknown tools, bad arguments, and handler
    /// failures all become failed results the LLM can read.
    pub async fn dispatch(&self, ctx: &ToolContext, call: &ToolCall) -> ToolResult {
        let started = Instant::now();

        let outcome = match self.tools.get(&call.function.name) {
            None => ToolOutcome::fail(
                "unknown_tool",
                format!("no tool named {:?} is registered", call.function.name),
            ),
            Some(tool) => match parse_arguments(&call.function.arguments) {
                Err(reason) => ToolOutcome::fail("bad_arguments", reason),
                Ok(args) => match validate_against_schema(&tool.parameters(), &args) {
                    Err((field, reason)) => ToolOutcome::fail(
                        "bad_arguments",
                        format!("argument {:?}: {}", field, reason),
                    ),
                    Ok(()) => tool.execute(ctx, args).await,
                },
            },
        };

        let outcome_label = if outcome.success { "ok" } else { "error" };
        TOOL_CALLS
            .with_label_values(&[call.function.name.as_str(), outcome_label])
            .inc();

        ToolResult {
            call_id: call.id.clone(),
            tool: call.function.name.clone(),
            success: outcome.success,
            output: outcome.output,
            error_kind: outcome.error_kind,
            exit_code: outcome.exit_code,
            duration_ms: started.elapsed().as_millis() as u64,
            truncated: outcome.truncated,
            argv: outcome.argv,
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The wire format carries arguments as a JSON-encoded string
fn parse_arguments(raw: &str) -> Result<serde_json::Value, String> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) if value.is_object() => Ok(value),
        Ok(_) => Err("arguments must be a JSON object".to_string()),
        Err(e) => Err(format!("arguments are not valid JSON: {}", e)),
    }
}

/// Check the argument object against the schema's required list and
/// property types
fn validate_against_schema(
    schema: &serde_json::Value,
    args: &serde_json::Value,
) -> Result<(), (String, String)> {
    let empty = Vec::new();
    let required = schema["required"].as_array().unwrap_or(&empty);
    for field in required {
        let name = field.as_str().unwrap_or_default();
        if args.get(name).map(|v| v.is_null()).unwrap_or(true) {
            return Err((name.to_string(), "required field is missing".to_string()));
        }
    }

    if let Some(properties) = schema["properties"].as_object() {
        for (name, spec) in properties {
            let Some(value) = args.get(name) else { continue };
            if value.is_null() {
                continue;
            }
            let expected = spec["type"].as_str().unwrap_or("object");
            let matches = match expected {
                "string" => value.is_string(),
                "integer" | "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                _ => value.is_object(),
            };
            if !matches {
                return Err((name.clone(), format!("expected {}", expected)));
            }
        }
    }

    Ok(())
}
