//! shell_exec tool - validated command execution in the conversation sandbox
//!
//! The command string goes through the allowlist validator first; only an
//! accepted argv ever reaches the sandbox, and it is executed token-for-token.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::SandboxConfig;
use crate::sandbox::SandboxManager;
use crate::validator;

use super::{Tool, ToolContext, ToolOutcome};

#[derive(Debug, Deserialize)]
struct ShellExecArgs {
    command: String,
}

pub struct ShellExecTool {
    sandbox: Arc<SandboxManager>,
    exec_timeout: Duration,
}

impl ShellExecTool {
    pub fn new(sandbox: Arc<SandboxManager>, config: &SandboxConfig) -> Self {
        Self {
            sandbox,
            exec_timeout: Duration::from_secs(config.exec_timeout_s),
        }
    }
}

#[async_trait]
impl Tool for ShellExecTool {
    fn name(&self) -> &'static str {
        "shell_exec"
    }

    fn description(&self) -> &'static str {
        "Run a single command in the conversation's isolated container. \
         Only allowlisted commands are permitted (ls, cat, grep, find, sed, awk, \
         mkdir, rm, ...); pipes, redirection, and command substitution are rejected. \
         Files persist in /workspace for the session. There is no network access."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command to run, e.g. \"ls -la /workspace\""
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: serde_json::Value) -> ToolOutcome {
        let args: ShellExecArgs = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(e) => return ToolOutcome::fail("bad_arguments", e.to_string()),
        };

        let argv = match validator::validate(&args.command) {
            Ok(argv) => argv,
            Err(e) => return ToolOutcome::fail(e.kind(), e.to_string()),
        };

        let outcome = match self
            .sandbox
            .exec(&ctx.chat_id, &argv, self.exec_timeout)
            .await
        {
            Ok(o) => o,
            Err(e) => return ToolOutcome::fail(e.kind(), e.to_string()),
        };

        if outcome.timed_out {
            let mut result = ToolOutcome::fail(
                "exec_timeout",
                format!(
                    "command did not finish within {}s\n{}",
                    self.exec_timeout.as_secs(),
                    outcome.output
                ),
            );
            result.truncated = outcome.truncated;
            result.argv = Some(argv);
            return result;
        }

        // Non-zero exits are results, not errors; the model reads the exit
        // code and decides what to do.
        let exit_code = outcome.exit_code.unwrap_or(-1);
        let mut text = format!("Exit code: {}\n{}", exit_code, outcome.output);
        if outcome.truncated {
            text.push_str("\n(output truncated)");
        }

        let mut result = ToolOutcome::ok(text);
        result.exit_code = Some(exit_code);
        result.truncated = outcome.truncated;
        result.argv = Some(argv);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SandboxConfig;

    fn tool() -> ShellExecTool {
        let config = SandboxConfig::default();
        let sandbox = Arc::new(SandboxManager::new(
            config.clone(),
            std::env::temp_dir().join("shellvisor-shell-exec-test"),
        ));
        ShellExecTool::new(sandbox, &config)
    }

    fn ctx() -> ToolContext {
        ToolContext {
            chat_id: "cli-test".to_string(),
        }
    }

    #[tokio::test]
    async fn rejects_forbidden_command_before_sandbox() {
        // No Docker needed: validation fails first.
        let outcome = tool()
            .execute(&ctx(), serde_json::json!({"command": "ls | grep foo"}))
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind.as_deref(), Some("forbidden_pattern"));
    }

    #[tokio::test]
    async fn rejects_unknown_command_before_sandbox() {
        let outcome = tool()
            .execute(&ctx(), serde_json::json!({"command": "curl http://x"}))
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind.as_deref(), Some("not_allowed"));
    }

    #[tokio::test]
    async fn rejects_missing_command_argument() {
        let outcome = tool().execute(&ctx(), serde_json::json!({})).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind.as_deref(), Some("bad_arguments"));
    }
}
