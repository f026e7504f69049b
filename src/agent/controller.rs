//! Agent loop - orchestrates the LLM and the tool registry
//!
//! Runs Think→Act→Observe until the model answers without tool calls or a
//! circuit breaker trips. The loop never retries a failed LLM call and never
//! feeds breaker decisions back to the model; those surface to the caller as
//! the stop reason.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::AgentConfig;
use crate::llm::{ChatMessage, ChatProvider, ToolCall};
use crate::logging::EventLog;
use crate::metrics::AGENT_STOPS;
use crate::sandbox::SandboxManager;
use crate::tools::{ToolContext, ToolRegistry};

use super::sessions::Session;

/// Why the loop terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model produced a final answer
    Completed,
    /// Turn cap reached
    MaxTurns,
    /// The same call signature appeared in two consecutive turns
    RepeatedCall,
    /// Too many failed tool results in a row
    ConsecutiveErrors,
    /// Transport or provider error from the LLM
    LlmError,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Completed => "completed",
            StopReason::MaxTurns => "max_turns",
            StopReason::RepeatedCall => "repeated_call",
            StopReason::ConsecutiveErrors => "consecutive_errors",
            StopReason::LlmError => "llm_error",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounded record of one dispatched call, kept in the per-turn trace
#[derive(Debug, Clone)]
pub struct CallTrace {
    pub call_id: String,
    pub tool: String,
    pub success: bool,
    pub error_kind: Option<String>,
    /// Excerpt of the result payload, capped for the trace
    pub summary: String,
}

/// Trace of one loop iteration
#[derive(Debug, Clone)]
pub struct TurnTrace {
    pub turn: usize,
    pub calls: Vec<CallTrace>,
}

/// Terminal output of one agent run
#[derive(Debug, Clone)]
pub struct AgentResult {
    /// The model's last textual output, or a short sentence naming the stop
    /// reason when there was none
    pub response: String,
    pub stop_reason: StopReason,
    /// Number of LLM calls made
    pub turns: usize,
    /// Number of tool calls dispatched
    pub tool_calls_made: usize,
    pub trace: Vec<TurnTrace>,
}

/// Maximum bytes of a result payload kept in the trace
const TRACE_EXCERPT_BYTES: usize = 200;

/// The agent loop itself; one instance serves all conversations
pub struct AgentLoop {
    provider: Arc<dyn ChatProvider>,
    registry: Arc<ToolRegistry>,
    config: AgentConfig,
    log: EventLog,
    /// Used only to attach container ids to log records
    sandbox: Option<Arc<SandboxManager>>,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        registry: Arc<ToolRegistry>,
        config: AgentConfig,
        log: EventLog,
        sandbox: Option<Arc<SandboxManager>>,
    ) -> Self {
        Self {
            provider,
            registry,
            config,
            log,
            sandbox,
        }
    }

    /// Run one user message through the loop
    ///
    /// The caller holds the session mutex for the whole call, so history
    /// mutation is single-writer per conversation.
    pub async fn run(&self, session: &mut Session, user_text: &str) -> AgentResult {
        session.add_message(ChatMessage::user(user_text));

        let tools = self.registry.schemas();
        let ctx = ToolContext {
            chat_id: session.chat_id.clone(),
        };

        let mut turns = 0usize;
        let mut tool_calls_made = 0usize;
        let mut trace: Vec<TurnTrace> = Vec::new();
        let mut consecutive_errors = 0usize;
        // Per-signature count of consecutive turns it has appeared in
        let mut repeat_streaks: HashMap<String, usize> = HashMap::new();
        let mut last_text = String::new();

        let stop_reason = loop {
            // Circuit breakers, checked before every THINK step
            if turns >= self.config.max_turns {
                break StopReason::MaxTurns;
            }
            if consecutive_errors >= self.config.max_consecutive_errors {
                break StopReason::ConsecutiveErrors;
            }

            let reply = match self.provider.chat(&session.messages, &tools).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(chat_id = %session.chat_id, error = %e, "llm call failed");
                    break StopReason::LlmError;
                }
            };
            turns += 1;
            session.increment_iterations();

            if !reply.text().is_empty() {
                last_text = reply.text().to_string();
            }

            let calls: Vec<ToolCall> = reply.tool_calls().to_vec();
            session.add_message(reply);

            if calls.is_empty() {
                break StopReason::Completed;
            }

            // Oscillation guard: a signature carried over `max_repeated`
            // consecutive turns stops the loop before the duplicate runs
            // again.
            let signatures: Vec<String> = calls.iter().map(call_signature).collect();
            let mut next_streaks: HashMap<String, usize> = HashMap::new();
            for sig in &signatures {
                let streak = repeat_streaks.get(sig).copied().unwrap_or(0) + 1;
                next_streaks.insert(sig.clone(), streak);
            }
            if next_streaks
                .values()
                .any(|&streak| streak >= self.config.max_repeated)
            {
                debug!(chat_id = %session.chat_id, "repeated call signature detected");
                break StopReason::RepeatedCall;
            }

            let mut call_traces = Vec::with_capacity(calls.len());
            for call in &calls {
                let result = self.registry.dispatch(&ctx, call).await;
                tool_calls_made += 1;

                if result.success {
                    consecutive_errors = 0;
                } else {
                    consecutive_errors += 1;
                }

                let container_id = match &self.sandbox {
                    Some(sandbox) => sandbox.container_id(&ctx.chat_id).await,
                    None => None,
                };
                self.log.tool_invocation(
                    &ctx.chat_id,
                    container_id.as_deref(),
                    &result.tool,
                    result.argv.as_deref(),
                    result.success,
                    result.error_kind.as_deref(),
                    result.exit_code,
                    result.duration_ms,
                    result.truncated,
                );

                call_traces.push(CallTrace {
                    call_id: result.call_id.clone(),
                    tool: result.tool.clone(),
                    success: result.success,
                    error_kind: result.error_kind.clone(),
                    summary: excerpt(&result.output, TRACE_EXCERPT_BYTES),
                });

                // Results are appended in call order, keyed by call id.
                session.add_message(ChatMessage::tool(&result.call_id, result.render()));
            }

            trace.push(TurnTrace {
                turn: turns,
                calls: call_traces,
            });
            repeat_streaks = next_streaks;
        };

        let response = if last_text.is_empty() {
            fallback_text(stop_reason)
        } else {
            last_text
        };

        AGENT_STOPS.with_label_values(&[stop_reason.as_str()]).inc();
        self.log
            .loop_stop(&session.chat_id, stop_reason.as_str(), turns, tool_calls_made);

        AgentResult {
            response,
            stop_reason,
            turns,
            tool_calls_made,
            trace,
        }
    }
}

/// Short user-facing sentence for runs that ended without model text
fn fallback_text(reason: StopReason) -> String {
    match reason {
        StopReason::Completed => "Done.".to_string(),
        StopReason::MaxTurns => "The agent stopped: turn limit reached.".to_string(),
        StopReason::RepeatedCall => {
            "The agent stopped: it kept repeating the same tool call.".to_string()
        }
        StopReason::ConsecutiveErrors => {
            "The agent stopped: too many tool errors in a row.".to_string()
        }
        StopReason::LlmError => "The agent stopped: the language model request failed.".to_string(),
    }
}

/// Canonical signature of a tool call, used for repeat detection
///
/// Two calls are "the same" iff their canonical forms are byte-equal:
/// argument keys are ordered bytewise and string values are whitespace-
/// normalised, so trivially reworded reissues still match.
pub fn call_signature(call: &ToolCall) -> String {
    let canonical_args = match serde_json::from_str::<serde_json::Value>(&call.function.arguments)
    {
        Ok(value) => canonicalize_value(&value).to_string(),
        // Unparseable arguments still participate, as normalised text.
        Err(_) => normalize_ws(&call.function.arguments),
    };
    format!("{}({})", call.function.name, canonical_args)
}

/// Rebuild a JSON value with sorted object keys and normalised strings
fn canonicalize_value(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            // serde_json::Map orders keys bytewise already; rebuilding after
            // normalising the values keeps that ordering.
            let mut out = serde_json::Map::new();
            for (key, val) in map {
                out.insert(key.clone(), canonicalize_value(val));
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize_value).collect())
        }
        serde_json::Value::String(s) => serde_json::Value::String(normalize_ws(s)),
        other => other.clone(),
    }
}

/// Collapse runs of ASCII whitespace to one space and trim the tail
fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_ws = false;
    for c in s.chars() {
        if c.is_ascii_whitespace() {
            if !in_ws {
                out.push(' ');
            }
            in_ws = true;
        } else {
            out.push(c);
            in_ws = false;
        }
    }
    out.truncate(out.trim_end().len());
    out
}

/// First `cap` bytes of a payload, on a char boundary
fn excerpt(s: &str, cap: usize) -> String {
    if s.len() <= cap {
        return s.to_string();
    }
    let mut end = cap;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FunctionCall;

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_x".to_string(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    #[test]
    fn signature_ignores_key_order() {
        let a = call("shell_exec", r#"{"command": "pwd", "extra": 1}"#);
        let b = call("shell_exec", r#"{"extra": 1, "command": "pwd"}"#);
        assert_eq!(call_signature(&a), call_signature(&b));
    }

    #[test]
    fn signature_normalises_whitespace_in_strings() {
        let a = call("shell_exec", r#"{"command": "ls   -la  /workspace"}"#);
        let b = call("shell_exec", r#"{"command": "ls -la /workspace  "}"#);
        assert_eq!(call_signature(&a), call_signature(&b));
    }

    #[test]
    fn signature_distinguishes_different_arguments() {
        let a = call("shell_exec", r#"{"command": "pwd"}"#);
        let b = call("shell_exec", r#"{"command": "ls"}"#);
        assert_ne!(call_signature(&a), call_signature(&b));
    }

    #[test]
    fn signature_distinguishes_tools() {
        let a = call("shell_exec", r#"{"command": "pwd"}"#);
        let mut b = call("web_fetch", r#"{"command": "pwd"}"#);
        b.function.name = "web_fetch".to_string();
        assert_ne!(call_signature(&a), call_signature(&b));
    }

    #[test]
    fn normalize_ws_rules() {
        assert_eq!(normalize_ws("a  b\t\tc"), "a b c");
        assert_eq!(normalize_ws("a b c   "), "a b c");
        assert_eq!(normalize_ws("a\nb"), "a b");
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        let s = "héllo wörld";
        let e = excerpt(s, 3);
        assert!(e.starts_with("hé") || e.starts_with("h"));
        let short = excerpt("abc", 10);
        assert_eq!(short, "abc");
    }

    #[test]
    fn stop_reason_strings() {
        assert_eq!(StopReason::Completed.as_str(), "completed");
        assert_eq!(StopReason::MaxTurns.as_str(), "max_turns");
        assert_eq!(StopReason::RepeatedCall.as_str(), "repeated_call");
        assert_eq!(StopReason::ConsecutiveErrors.as_str(), "consecutive_errors");
        assert_eq!(StopReason::LlmError.as_str(), "llm_error");
    }
}
