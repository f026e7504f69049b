//! Tool trait, dispatch results, and the built-in tools
//!
//! Exactly two tools are registered in the core: `shell_exec` (validator +
//! sandbox) and `web_fetch` (safe fetcher). Tool failures are results, not
//! errors: they are rendered back to the LLM so the loop can react.

pub mod registry;
pub mod shell_exec;
pub mod web_fetch;

pub use registry::ToolRegistry;
pub use shell_exec::ShellExecTool;
pub use web_fetch::WebFetchTool;

use async_trait::async_trait;

/// Per-dispatch context handed to every tool
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Conversation the call belongs to; keys the sandbox container
    pub chat_id: String,
}

/// What a tool handler produced, before the registry stamps identity on it
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub success: bool,
    /// Text delivered to the LLM (already bounded by the producing subsystem)
    pub output: String,
    /// Stable error identifier when `success` is false
    pub error_kind: Option<String>,
    pub exit_code: Option<i32>,
    pub truncated: bool,
    /// Argv that was executed, for shell commands only (log record field)
    pub argv: Option<Vec<String>>,
}

impl ToolOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error_kind: None,
            exit_code: None,
            truncated: false,
            argv: None,
        }
    }

    pub fn fail(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: message.into(),
            error_kind: Some(kind.into()),
            exit_code: None,
            truncated: false,
            argv: None,
        }
    }
}

/// One tool result, keyed by the call that produced it
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// Round-tripped id of the originating tool call
    pub call_id: String,
    pub tool: String,
    pub success: bool,
    pub output: String,
    pub error_kind: Option<String>,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub truncated: bool,
    pub argv: Option<Vec<String>>,
}

impl ToolResult {
    /// Render the result as the tool-role message content for the LLM
    pub fn render(&self) -> String {
        if self.success {
            format!("[{}] Success:\n{}", self.tool, self.output)
        } else {
            let kind = self.error_kind.as_deref().unwrap_or("error");
            format!("[{}] Error ({}): {}", self.tool, kind, self.output)
        }
    }
}

/// A capability the LLM may invoke
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name advertised to the model
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON-schema shape of the argument object
    fn parameters(&self) -> serde_json::Value;

    async fn execute(&self, ctx: &ToolContext, args: serde_json::Value) -> ToolOutcome;
}
