//! Chat-completion client with tool calling
//!
//! Speaks the OpenAI-compatible `/chat/completions` dialect (the reference
//! deployment points it at a Groq endpoint, but any compatible provider
//! works). The agent loop consumes the [`ChatProvider`] trait rather than
//! the concrete client, so tests can script a provider.

pub mod chat;

pub use chat::{
    ChatClient, ChatError, ChatMessage, ChatProvider, FunctionCall, ToolCall, ToolDef,
    ToolFunction,
};
