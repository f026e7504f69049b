//! Structured event log
//!
//! Emits one JSON object per line: one record per tool invocation and one per
//! agent-loop termination. Records never contain request/response bodies or
//! credentials; payloads stay in the conversation, not in the log.
//!
//! Console diagnostics (human-readable) go through `tracing` as usual and are
//! configured separately by [`init_tracing`].

use std::io::Write;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Initialize console diagnostics
///
/// Respects `RUST_LOG`; defaults to `info` for everything and `debug` for
/// this crate.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shellvisor=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Sink for structured records, shared across the process
///
/// Cloning is cheap; all clones write to the same underlying stream.
#[derive(Clone)]
pub struct EventLog {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl EventLog {
    /// Log records go to stderr by default
    pub fn stderr() -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(std::io::stderr()))),
        }
    }

    /// Write records to an arbitrary stream (tests use a buffer)
    pub fn to_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Arc::new(Mutex::new(writer)),
        }
    }

    /// Record one tool invocation
    ///
    /// `argv` is present for shell-exec only; `container_id` only once the
    /// conversation has a live container.
    #[allow(clippy::too_many_arguments)]
    pub fn tool_invocation(
        &self,
        chat_id: &str,
        container_id: Option<&str>,
        tool: &str,
        argv: Option<&[String]>,
        success: bool,
        error_kind: Option<&str>,
        exit_code: Option<i32>,
        duration_ms: u64,
        truncated: bool,
    ) {
        self.write(json!({
            "ts": Utc::now().to_rfc3339(),
            "event": "tool_invocation",
            "chat_id": chat_id,
            "container_id": container_id,
            "tool": tool,
            "argv": argv,
            "success": success,
            "error_kind": error_kind,
            "exit_code": exit_code,
            "duration_ms": duration_ms,
            "truncated": truncated,
        }));
    }

    /// Record an agent-loop termination
    pub fn loop_stop(&self, chat_id: &str, stop_reason: &str, turns: usize, tool_calls: usize) {
        self.write(json!({
            "ts": Utc::now().to_rfc3339(),
            "event": "agent_stop",
            "chat_id": chat_id,
            "stop_reason": stop_reason,
            "turns": turns,
            "tool_calls": tool_calls,
        }));
    }

    fn write(&self, record: serde_json::Value) {
        if let Ok(mut sink) = self.sink.lock() {
            // A broken sink must never take the agent down with it
            let _ = writeln!(sink, "{}", record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_tool_invocation_record_shape() {
        let buf = SharedBuf(Arc::new(Mutex::new(Vec::new())));
        let log = EventLog::to_writer(Box::new(buf.clone()));

        let argv = vec!["ls".to_string(), "/workspace".to_string()];
        log.tool_invocation(
            "cli-1234",
            Some("abcdef012345"),
            "shell_exec",
            Some(&argv),
            true,
            None,
            Some(0),
            42,
            false,
        );

        let raw = buf.0.lock().unwrap().clone();
        let line = String::from_utf8(raw).unwrap();
        let record: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(record["event"], "tool_invocation");
        assert_eq!(record["chat_id"], "cli-1234");
        assert_eq!(record["tool"], "shell_exec");
        assert_eq!(record["argv"][0], "ls");
        assert_eq!(record["exit_code"], 0);
        assert_eq!(record["truncated"], false);
    }

    #[test]
    fn test_loop_stop_record_shape() {
        let buf = SharedBuf(Arc::new(Mutex::new(Vec::new())));
        let log = EventLog::to_writer(Box::new(buf.clone()));

        log.loop_stop("cli-1234", "max_turns", 10, 9);

        let raw = buf.0.lock().unwrap().clone();
        let record: serde_json::Value =
            serde_json::from_str(String::from_utf8(raw).unwrap().trim()).unwrap();
        assert_eq!(record["event"], "agent_stop");
        assert_eq!(record["stop_reason"], "max_turns");
        assert_eq!(record["turns"], 10);
    }

    #[test]
    fn test_one_record_per_line() {
        let buf = SharedBuf(Arc::new(Mutex::new(Vec::new())));
        let log = EventLog::to_writer(Box::new(buf.clone()));

        log.loop_stop("a", "completed", 1, 0);
        log.loop_stop("b", "completed", 2, 1);

        let raw = buf.0.lock().unwrap().clone();
        let text = String::from_utf8(raw).unwrap();
        assert_eq!(text.trim().lines().count(), 2);
        for line in text.trim().lines() {
            assert!(serde_json::from_str::<serde_json::Value>(line).is_ok());
        }
    }
}
