//! Container handle - one per live conversation
//!
//! Handles are owned exclusively by the [`SandboxManager`](super::SandboxManager);
//! sessions refer to containers by conversation id only, which keeps cleanup
//! trivially correct (no ownership cycles between sessions and containers).

use std::path::PathBuf;
use std::time::Instant;

/// Tracks one conversation container from creation to removal
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    /// Deterministic name, `runner-<chat_id>` (sanitised)
    pub name: String,
    /// Identifier assigned by the container engine at creation
    pub backend_id: String,
    /// Host directory bind-mounted read-write at /workspace
    pub workspace_dir: PathBuf,
    /// Whether the container was running when last observed
    pub running: bool,
    /// When this handle was created
    pub created_at: Instant,
}

impl ContainerHandle {
    pub fn new(name: String, backend_id: String, workspace_dir: PathBuf) -> Self {
        Self {
            name,
            backend_id,
            workspace_dir,
            running: true,
            created_at: Instant::now(),
        }
    }

    /// Time since the container was created
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}
