//! Agent module - the bounded Think→Act→Observe loop and its sessions
//!
//! # Architecture
//!
//! ```text
//! User message → SessionCoordinator (per-conversation mutex)
//!                      ↓
//!               AgentLoop (THINK) → chat completion with tool schemas
//!                      ↓ tool calls
//!               ToolRegistry (ACT) → shell_exec / web_fetch
//!                      ↓ results keyed by call id
//!               history append (OBSERVE) → loop, until no tool calls
//!                      ↓
//!               AgentResult { response, stop_reason, turns, trace }
//! ```
//!
//! Circuit breakers bound every run: a turn cap, repeated-call detection
//! over canonicalised call signatures, a consecutive-error limit, and
//! immediate termination on provider errors.

pub mod controller;
pub mod prompt;
pub mod sessions;

pub use controller::{AgentLoop, AgentResult, CallTrace, StopReason, TurnTrace};
pub use prompt::build_system_prompt;
pub use sessions::{Session, SessionCoordinator};
