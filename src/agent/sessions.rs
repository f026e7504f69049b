//! Conversation sessions and the per-conversation coordinator
//!
//! Sessions live in memory only; history does not survive a process restart.
//! The coordinator serialises requests per conversation id with a keyed
//! mutex map while letting different conversations run concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::info;

use crate::config::Config;
use crate::fetch::SafeFetcher;
use crate::llm::{ChatClient, ChatMessage, ChatProvider};
use crate::logging::EventLog;
use crate::sandbox::SandboxManager;
use crate::tools::{ShellExecTool, ToolRegistry, WebFetchTool};

use super::controller::{AgentLoop, AgentResult};
use super::prompt::build_system_prompt;

/// One conversation's state
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque external identifier supplied by the front-end
    pub chat_id: String,
    pub created_at: DateTime<Utc>,
    /// Append-only ordered history, starting with the system prompt
    pub messages: Vec<ChatMessage>,
    /// Total loop iterations across all requests
    pub iterations: usize,
}

impl Session {
    pub fn new(chat_id: impl Into<String>, system_prompt: &str) -> Self {
        Self {
            chat_id: chat_id.into(),
            created_at: Utc::now(),
            messages: vec![ChatMessage::system(system_prompt)],
            iterations: 0,
        }
    }

    pub fn add_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn increment_iterations(&mut self) {
        self.iterations += 1;
    }
}

/// Holder for one session behind its own mutex
struct SessionSlot {
    session: Mutex<Session>,
}

/// Serialises requests per conversation and owns the shared machinery
pub struct SessionCoordinator {
    /// Meta-lock guarding slot creation; slot mutexes guard the sessions
    sessions: Mutex<HashMap<String, Arc<SessionSlot>>>,
    agent: AgentLoop,
    sandbox: Arc<SandboxManager>,
    system_prompt: String,
}

impl SessionCoordinator {
    /// Build the full stack against the real chat provider
    pub fn new(config: &Config, skills: &[(String, String)]) -> Self {
        let provider: Arc<dyn ChatProvider> = Arc::new(ChatClient::new(&config.llm));
        Self::with_provider(provider, config, skills)
    }

    /// Build against an arbitrary provider (tests script one)
    pub fn with_provider(
        provider: Arc<dyn ChatProvider>,
        config: &Config,
        skills: &[(String, String)],
    ) -> Self {
        let sandbox = Arc::new(SandboxManager::new(
            config.sandbox.clone(),
            config.workspace_root.clone(),
        ));
        let fetcher = Arc::new(SafeFetcher::new(config.fetch.clone()));

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(ShellExecTool::new(
            Arc::clone(&sandbox),
            &config.sandbox,
        )));
        registry.register(Arc::new(WebFetchTool::new(fetcher)));
        let registry = Arc::new(registry);

        let system_prompt = build_system_prompt(&registry.descriptions(), skills);

        let agent = AgentLoop::new(
            provider,
            Arc::clone(&registry),
            config.agent.clone(),
            EventLog::stderr(),
            Some(Arc::clone(&sandbox)),
        );

        Self {
            sessions: Mutex::new(HashMap::new()),
            agent,
            sandbox,
            system_prompt,
        }
    }

    /// Run one user message through the conversation's agent loop
    ///
    /// Holds the conversation mutex for the whole run: a second request for
    /// the same id waits; requests for other ids proceed in parallel.
    pub async fn handle_message(&self, chat_id: &str, text: &str) -> AgentResult {
        let slot = self.slot(chat_id).await;
        let mut session = slot.session.lock().await;
        self.agent.run(&mut session, text).await
    }

    /// Drop the conversation's history and container
    pub async fn reset(&self, chat_id: &str) {
        {
            let mut sessions = self.sessions.lock().await;
            sessions.remove(chat_id);
        }
        if let Err(e) = self.sandbox.reset(chat_id).await {
            tracing::warn!(chat_id, error = %e, "sandbox reset failed");
        }
        info!(chat_id, "session reset");
    }

    /// Number of sessions currently held
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Reap orphaned containers from previous runs
    pub async fn reap_orphans(&self) -> usize {
        self.sandbox.cleanup_all().await
    }

    /// Remove every container this process created
    pub async fn shutdown(&self) {
        let removed = self.sandbox.cleanup_all().await;
        info!(removed, "coordinator shut down");
    }

    /// Look up or create the conversation's slot, race-free
    async fn slot(&self, chat_id: &str) -> Arc<SessionSlot> {
        let mut sessions = self.sessions.lock().await;
        if let Some(slot) = sessions.get(chat_id) {
            return Arc::clone(slot);
        }
        let slot = Arc::new(SessionSlot {
            session: Mutex::new(Session::new(chat_id, &self.system_prompt)),
        });
        sessions.insert(chat_id.to_string(), Arc::clone(&slot));
        info!(chat_id, "session created");
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_starts_with_system_prompt() {
        let session = Session::new("cli-1234", "You are helpful.");
        assert_eq!(session.chat_id, "cli-1234");
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, "system");
        assert_eq!(session.iterations, 0);
    }

    #[test]
    fn test_session_appends_in_order() {
        let mut session = Session::new("cli-1234", "sys");
        session.add_message(ChatMessage::user("hello"));
        session.add_message(ChatMessage::assistant("hi"));
        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.messages[1].role, "user");
        assert_eq!(session.messages[2].role, "assistant");
    }

    #[test]
    fn test_iteration_counter() {
        let mut session = Session::new("cli-1234", "sys");
        session.increment_iterations();
        session.increment_iterations();
        assert_eq!(session.iterations, 2);
    }
}
