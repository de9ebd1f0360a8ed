//! Conversational layer of Procura.
//!
//! The model is only a translator between the user and a fixed set of
//! functions; every record it reports comes from a function response.
//!
//! - `llm` / `gemini`: model port and the Gemini `generateContent` client
//! - `tools` / `functions`: function registry and the procurement functions
//! - `conversation` / `session`: history invariants and the session registry
//! - `orchestrator`: per-turn processing with bounded retries
//! - `reply` / `guardrails`: reply post-processing and message checks

pub mod conversation;
pub mod functions;
pub mod gemini;
pub mod guardrails;
pub mod llm;
pub mod orchestrator;
pub mod reply;
pub mod retry;
pub mod runtime;
pub mod session;
pub mod tools;

#[cfg(test)]
mod testing;

pub use orchestrator::{ChatError, FunctionCallSummary, Orchestrator, TurnOutcome};
pub use runtime::{AgentRuntime, DEFAULT_SYSTEM_PRIME};
pub use session::{SessionKey, SessionRegistry};
