//! Runtime configuration
//!
//! All options are read exactly once at start-up, from environment variables
//! with built-in defaults. A malformed value is a configuration error and
//! aborts start-up (exit code 1); nothing re-reads the environment later.

use std::env;
use std::path::PathBuf;

/// Error produced while reading configuration at start-up
#[derive(Debug)]
pub enum ConfigError {
    /// A required option is missing (e.g. the LLM API key)
    Missing(&'static str),
    /// An option is present but cannot be parsed
    Invalid(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing required option {}", key),
            ConfigError::Invalid(key, value) => {
                write!(f, "invalid value {:?} for option {}", value, key)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// LLM provider settings
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible chat-completions endpoint
    pub endpoint: String,
    /// Bearer token for the provider
    pub api_key: String,
    /// Model identifier passed on every request
    pub model: String,
}

/// Agent loop settings
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum number of iterations (LLM calls) before stopping
    pub max_turns: usize,
    /// Consecutive turns the same call signature may appear before stopping
    pub max_repeated: usize,
    /// Trailing failed tool results tolerated before the loop stops
    pub max_consecutive_errors: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            max_repeated: 2,
            max_consecutive_errors: 3,
        }
    }
}

/// Sandbox container settings
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Container image; must carry coreutils/findutils/grep/sed/awk and
    /// no network clients
    pub image: String,
    /// Memory limit in MiB
    pub mem_mib: u64,
    /// CPU limit in cores (fractional allowed)
    pub cpus: f64,
    /// Maximum number of processes inside the container
    pub pids: u32,
    /// Wall-clock limit for a single exec, in seconds
    pub exec_timeout_s: u64,
    /// Captured output is cut at this many bytes
    pub output_cap_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            image: "alpine:3.20".to_string(),
            mem_mib: 512,
            cpus: 1.0,
            pids: 128,
            exec_timeout_s: 30,
            output_cap_bytes: 65536,
        }
    }
}

/// Outbound fetch settings
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Response bodies are cut at this many bytes
    pub max_bytes: usize,
    /// Total time budget for one fetch, in seconds
    pub timeout_s: u64,
    /// Redirect hop budget
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_bytes: 1024 * 1024,
            timeout_s: 15,
            max_redirects: 5,
        }
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub sandbox: SandboxConfig,
    pub fetch: FetchConfig,
    /// Per-conversation workspace directories live under this root
    pub workspace_root: PathBuf,
}

impl Config {
    /// Read the full configuration from the environment
    ///
    /// Every option has a default except the LLM API key.
    pub fn from_env() -> Result<Self, ConfigError> {
        let llm = LlmConfig {
            endpoint: env_or("SHELLVISOR_LLM_ENDPOINT", "https://api.groq.com/openai/v1"),
            api_key: env::var("SHELLVISOR_LLM_API_KEY")
                .map_err(|_| ConfigError::Missing("llm.api_key (SHELLVISOR_LLM_API_KEY)"))?,
            model: env_or("SHELLVISOR_LLM_MODEL", "llama-3.3-70b-versatile"),
        };

        let agent = AgentConfig {
            max_turns: parse_or("SHELLVISOR_MAX_TURNS", AgentConfig::default().max_turns)?,
            max_repeated: parse_or("SHELLVISOR_MAX_REPEATED", AgentConfig::default().max_repeated)?,
            max_consecutive_errors: parse_or(
                "SHELLVISOR_MAX_CONSECUTIVE_ERRORS",
                AgentConfig::default().max_consecutive_errors,
            )?,
        };

        let sandbox = SandboxConfig {
            image: env_or("SHELLVISOR_SANDBOX_IMAGE", &SandboxConfig::default().image),
            mem_mib: parse_or("SHELLVISOR_SANDBOX_MEM_MIB", SandboxConfig::default().mem_mib)?,
            cpus: parse_or("SHELLVISOR_SANDBOX_CPUS", SandboxConfig::default().cpus)?,
            pids: parse_or("SHELLVISOR_SANDBOX_PIDS", SandboxConfig::default().pids)?,
            exec_timeout_s: parse_or(
                "SHELLVISOR_EXEC_TIMEOUT_S",
                SandboxConfig::default().exec_timeout_s,
            )?,
            output_cap_bytes: parse_or(
                "SHELLVISOR_OUTPUT_CAP_BYTES",
                SandboxConfig::default().output_cap_bytes,
            )?,
        };

        let fetch = FetchConfig {
            max_bytes: parse_or("SHELLVISOR_FETCH_MAX_BYTES", FetchConfig::default().max_bytes)?,
            timeout_s: parse_or("SHELLVISOR_FETCH_TIMEOUT_S", FetchConfig::default().timeout_s)?,
            max_redirects: parse_or(
                "SHELLVISOR_FETCH_MAX_REDIRECTS",
                FetchConfig::default().max_redirects,
            )?,
        };

        let workspace_root =
            PathBuf::from(env_or("SHELLVISOR_WORKSPACE_ROOT", "./data/workspace"));

        Ok(Self {
            llm,
            agent,
            sandbox,
            fetch,
            workspace_root,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid(key, raw)),
        Err(_) => Ok(default),
    }
}
