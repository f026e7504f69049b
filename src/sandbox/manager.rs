//! Sandbox manager - creates, reuses, and destroys conversation containers
//!
//! The manager drives a Docker-compatible engine through its CLI. Every
//! container is created with the full isolation set at once: read-only root,
//! all capabilities dropped, no network interface, non-root user,
//! no-new-privileges, and pid/memory/cpu limits. The only writable surfaces
//! are the per-conversation workspace bind mount and a small tmpfs.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::handle::ContainerHandle;
use crate::config::SandboxConfig;
use crate::metrics::{ACTIVE_CONTAINERS, EXEC_DURATION};

/// Prefix for every container this process manages
const CONTAINER_PREFIX: &str = "runner-";

/// Mount point of the workspace inside the container
const WORKSPACE_MOUNT: &str = "/workspace";

/// Error type for sandbox operations
#[derive(Debug)]
pub enum SandboxError {
    /// The container engine cannot be reached at all
    SandboxUnavailable(String),
    /// The engine answered but the container could not be created or started
    ContainerStartFailed(String),
    /// Host-side I/O failed (workspace creation, process spawn)
    Io(std::io::Error),
}

impl std::fmt::Display for SandboxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SandboxError::SandboxUnavailable(msg) => {
                write!(f, "container engine unavailable: {}", msg)
            }
            SandboxError::ContainerStartFailed(msg) => {
                write!(f, "container start failed: {}", msg)
            }
            SandboxError::Io(e) => write!(f, "sandbox i/o error: {}", e),
        }
    }
}

impl std::error::Error for SandboxError {}

impl From<std::io::Error> for SandboxError {
    fn from(e: std::io::Error) -> Self {
        SandboxError::Io(e)
    }
}

impl SandboxError {
    /// Stable identifier used in tool results and log records
    pub fn kind(&self) -> &'static str {
        match self {
            SandboxError::SandboxUnavailable(_) => "sandbox_unavailable",
            SandboxError::ContainerStartFailed(_) => "container_start_failed",
            SandboxError::Io(_) => "sandbox_io",
        }
    }
}

/// Result of one exec inside a container
///
/// A non-zero exit code is a normal result, not an error; the LLM sees it
/// and reacts. `exit_code` is absent when the process did not terminate on
/// its own (timeout).
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub exit_code: Option<i32>,
    /// Combined stdout+stderr, capped at `output_cap_bytes`
    pub output: String,
    pub duration: Duration,
    pub truncated: bool,
    pub timed_out: bool,
}

/// Manages the container fleet, one container per conversation id
pub struct SandboxManager {
    config: SandboxConfig,
    workspace_root: PathBuf,
    handles: Arc<Mutex<HashMap<String, ContainerHandle>>>,
}

impl SandboxManager {
    pub fn new(config: SandboxConfig, workspace_root: PathBuf) -> Self {
        Self {
            config,
            workspace_root,
            handles: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Check that the container engine answers at all
    ///
    /// Called once at start-up; failure maps to exit code 2.
    pub async fn probe_engine() -> Result<(), SandboxError> {
        let output = Command::new("docker")
            .args(["version", "--format", "{{.Server.Version}}"])
            .output()
            .await
            .map_err(|e| SandboxError::SandboxUnavailable(e.to_string()))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(SandboxError::SandboxUnavailable(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    /// Deterministic container name for a conversation id
    ///
    /// The id is sanitised so it is always a valid container name.
    pub fn container_name(chat_id: &str) -> String {
        let sanitized: String = chat_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        format!("{}{}", CONTAINER_PREFIX, sanitized)
    }

    /// Backend id of the conversation's container, if one is alive
    pub async fn container_id(&self, chat_id: &str) -> Option<String> {
        let handles = self.handles.lock().await;
        handles.get(chat_id).map(|h| h.backend_id.clone())
    }

    /// Run an argv inside the conversation's container
    ///
    /// Creates the container on first use and transparently recreates it if
    /// it disappeared between calls. The argv is passed token-for-token; no
    /// shell re-interpretation happens on either side of the engine.
    pub async fn exec(
        &self,
        chat_id: &str,
        argv: &[String],
        timeout: Duration,
    ) -> Result<ExecOutcome, SandboxError> {
        let name = self.ensure_container(chat_id).await?;

        let outcome = self.exec_in_container(&name, argv, timeout).await?;
        EXEC_DURATION.observe(outcome.duration.as_secs_f64());

        if outcome.timed_out {
            // The exec child is dead but the in-container process may not
            // be. Removing the container stops it; the next exec recreates.
            warn!(chat_id, "exec timed out after {:?}, recycling container", timeout);
            self.reset(chat_id).await?;
        }

        Ok(outcome)
    }

    /// Destroy the conversation's container and forget it
    ///
    /// Idempotent: resetting an id with no container is not an error.
    pub async fn reset(&self, chat_id: &str) -> Result<(), SandboxError> {
        let removed = {
            let mut handles = self.handles.lock().await;
            handles.remove(chat_id)
        };

        let name = match removed {
            Some(handle) => {
                ACTIVE_CONTAINERS.dec();
                handle.name
            }
            // The container may exist from a previous process; remove by name anyway.
            None => Self::container_name(chat_id),
        };

        let _ = Command::new("docker")
            .args(["rm", "-f", name.as_str()])
            .output()
            .await;

        debug!(chat_id, container = %name, "container removed");
        Ok(())
    }

    /// Remove every container matching the managed prefix
    ///
    /// Run at start-up to reap orphans from prior crashes and again at
    /// shutdown. Returns the number of containers removed.
    pub async fn cleanup_all(&self) -> usize {
        let filter = format!("name=^{}", CONTAINER_PREFIX);
        let listed = Command::new("docker")
            .args(["ps", "-aq", "--filter", filter.as_str()])
            .output()
            .await;

        let ids: Vec<String> = match listed {
            Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
                .lines()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
            _ => return 0,
        };

        let mut removed = 0;
        for id in &ids {
            let result = Command::new("docker").args(["rm", "-f", id]).output().await;
            if matches!(result, Ok(ref o) if o.status.success()) {
                removed += 1;
            }
        }

        self.handles.lock().await.clear();
        ACTIVE_CONTAINERS.set(0);

        if removed > 0 {
            info!(removed, "cleaned up sandbox containers");
        }
        removed
    }

    /// Look up or (re)create the conversation's container, returning its name
    async fn ensure_container(&self, chat_id: &str) -> Result<String, SandboxError> {
        let mut handles = self.handles.lock().await;

        if let Some(handle) = handles.get(chat_id) {
            if self.is_running(&handle.name).await {
                return Ok(handle.name.clone());
            }
            // Stale handle: the container died or was removed underneath us.
            warn!(chat_id, container = %handle.name, "container gone, recreating");
            let name = handle.name.clone();
            handles.remove(chat_id);
            ACTIVE_CONTAINERS.dec();
            let _ = Command::new("docker").args(["rm", "-f", name.as_str()]).output().await;
        }

        let handle = self.create_container(chat_id).await?;
        let name = handle.name.clone();
        handles.insert(chat_id.to_string(), handle);
        ACTIVE_CONTAINERS.inc();
        Ok(name)
    }

    async fn is_running(&self, name: &str) -> bool {
        let output = Command::new("docker")
            .args(["inspect", "--format", "{{.State.Running}}", name])
            .output()
            .await;

        matches!(output, Ok(ref o) if String::from_utf8_lossy(&o.stdout).trim() == "true")
    }

    /// Create and start a fully isolated container for the conversation
    async fn create_container(&self, chat_id: &str) -> Result<ContainerHandle, SandboxError> {
        let name = Self::container_name(chat_id);
        let workspace_dir = self.workspace_root.join(chat_id);
        self.prepare_workspace(&workspace_dir)?;

        // Remove any leftover with the same name from a previous run.
        let _ = Command::new("docker").args(["rm", "-f", name.as_str()]).output().await;

        let bind = format!("{}:{}:rw", workspace_dir.display(), WORKSPACE_MOUNT);
        let pids = self.config.pids.to_string();
        let memory = format!("{}m", self.config.mem_mib);
        let cpus = self.config.cpus.to_string();
        let args = [
            "run",
            "-d",
            "--name",
            name.as_str(),
            "--read-only",
            "--cap-drop",
            "ALL",
            "--network",
            "none",
            "--user",
            "1000:1000",
            "--security-opt",
            "no-new-privileges",
            "--pids-limit",
            pids.as_str(),
            "--memory",
            memory.as_str(),
            "--cpus",
            cpus.as_str(),
            "-v",
            bind.as_str(),
            "--tmpfs",
            "/tmp:rw,size=64m",
            self.config.image.as_str(),
            "sleep",
            "infinity",
        ];

        info!(chat_id, container = %name, image = %self.config.image, "creating container");

        let output = Command::new("docker")
            .args(args)
            .output()
            .await
            .map_err(|e| SandboxError::SandboxUnavailable(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            // Partial isolation is not isolation. Whatever the engine
            // objected to, the container must not be used.
            let _ = Command::new("docker").args(["rm", "-f", name.as_str()]).output().await;
            if stderr.contains("Cannot connect") || stderr.contains("daemon") {
                return Err(SandboxError::SandboxUnavailable(stderr));
            }
            return Err(SandboxError::ContainerStartFailed(stderr));
        }

        let backend_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(ContainerHandle::new(name, backend_id, workspace_dir))
    }

    /// Create the host workspace directory with owner-only permissions
    fn prepare_workspace(&self, dir: &PathBuf) -> Result<(), SandboxError> {
        std::fs::create_dir_all(dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
        }
        Ok(())
    }

    /// Run the argv via `docker exec`, capturing output incrementally so a
    /// timeout still returns whatever arrived before the deadline
    async fn exec_in_container(
        &self,
        name: &str,
        argv: &[String],
        timeout: Duration,
    ) -> Result<ExecOutcome, SandboxError> {
        let start = Instant::now();

        let mut cmd = Command::new("docker");
        cmd.args(["exec", "-w", WORKSPACE_MOUNT, name]);
        cmd.args(argv);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;

        let mut stdout = child.stdout.take().ok_or_else(|| {
            SandboxError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "child stdout not captured",
            ))
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| {
            SandboxError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "child stderr not captured",
            ))
        })?;

        let out_buf = Arc::new(Mutex::new(Vec::new()));
        let err_buf = Arc::new(Mutex::new(Vec::new()));

        let out_task = {
            let buf = Arc::clone(&out_buf);
            tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                while let Ok(n) = stdout.read(&mut chunk).await {
                    if n == 0 {
                        break;
                    }
                    buf.lock().await.extend_from_slice(&chunk[..n]);
                }
            })
        };
        let err_task = {
            let buf = Arc::clone(&err_buf);
            tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                while let Ok(n) = stderr.read(&mut chunk).await {
                    if n == 0 {
                        break;
                    }
                    buf.lock().await.extend_from_slice(&chunk[..n]);
                }
            })
        };

        let (exit_code, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                // Let the readers drain whatever is still buffered.
                let _ = out_task.await;
                let _ = err_task.await;
                (status.code(), false)
            }
            Ok(Err(e)) => {
                out_task.abort();
                err_task.abort();
                return Err(SandboxError::Io(e));
            }
            Err(_) => {
                let _ = child.kill().await;
                out_task.abort();
                err_task.abort();
                (None, true)
            }
        };

        let mut combined = out_buf.lock().await.clone();
        combined.extend_from_slice(&err_buf.lock().await);

        let (output, truncated) = cap_output(combined, self.config.output_cap_bytes);

        Ok(ExecOutcome {
            exit_code,
            output,
            duration: start.elapsed(),
            truncated,
            timed_out,
        })
    }
}

/// Cut captured bytes at the cap; exactly at the cap is not truncation
fn cap_output(mut bytes: Vec<u8>, cap: usize) -> (String, bool) {
    let truncated = bytes.len() > cap;
    if truncated {
        bytes.truncate(cap);
    }
    (String::from_utf8_lossy(&bytes).into_owned(), truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_name_is_deterministic() {
        assert_eq!(
            SandboxManager::container_name("cli-1234"),
            "runner-cli-1234"
        );
        assert_eq!(
            SandboxManager::container_name("cli-1234"),
            SandboxManager::container_name("cli-1234")
        );
    }

    #[test]
    fn test_container_name_sanitises_hostile_ids() {
        assert_eq!(
            SandboxManager::container_name("a/b c$d"),
            "runner-a-b-c-d"
        );
        assert_eq!(SandboxManager::container_name("ok_id.1"), "runner-ok_id.1");
    }

    #[test]
    fn test_cap_output_under_cap() {
        let (out, truncated) = cap_output(b"hello".to_vec(), 64);
        assert_eq!(out, "hello");
        assert!(!truncated);
    }

    #[test]
    fn test_cap_output_exactly_at_cap_is_not_truncated() {
        let data = vec![b'x'; 64];
        let (out, truncated) = cap_output(data, 64);
        assert_eq!(out.len(), 64);
        assert!(!truncated);
    }

    #[test]
    fn test_cap_output_one_past_cap_is_truncated() {
        let data = vec![b'x'; 65];
        let (out, truncated) = cap_output(data, 64);
        assert_eq!(out.len(), 64);
        assert!(truncated);
    }

    #[tokio::test]
    async fn test_reset_without_container_is_ok() {
        let manager = SandboxManager::new(
            SandboxConfig::default(),
            std::env::temp_dir().join("shellvisor-test-ws"),
        );
        // No container exists for this id; reset must still succeed, twice.
        assert!(manager.reset("no-such-conversation").await.is_ok());
        assert!(manager.reset("no-such-conversation").await.is_ok());
    }

    #[tokio::test]
    #[ignore = "Requires a running Docker engine"]
    async fn test_exec_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let manager =
            SandboxManager::new(SandboxConfig::default(), tmp.path().to_path_buf());

        let argv = vec!["echo".to_string(), "hello".to_string()];
        let outcome = manager
            .exec("it-echo", &argv, Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.output.trim(), "hello");
        assert!(!outcome.timed_out);

        manager.reset("it-echo").await.unwrap();
    }

    #[tokio::test]
    #[ignore = "Requires a running Docker engine"]
    async fn test_exec_timeout_kills_container() {
        let tmp = tempfile::tempdir().unwrap();
        let manager =
            SandboxManager::new(SandboxConfig::default(), tmp.path().to_path_buf());

        let argv = vec!["sleep".to_string(), "60".to_string()];
        let outcome = manager
            .exec("it-timeout", &argv, Duration::from_secs(1))
            .await
            .unwrap();

        assert!(outcome.timed_out);
        assert!(outcome.exit_code.is_none());
        // The container was recycled, so no handle remains.
        assert!(manager.container_id("it-timeout").await.is_none());
    }
}
