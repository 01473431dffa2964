//! Model adapter implementations.
//!
//! One adapter per provider is selected at session start. The scripted
//! adapter replays canned turns for tests.

mod anthropic;
mod gemini;
mod http;
mod scripted;

pub use anthropic::{AnthropicAdapter, DEFAULT_ANTHROPIC_MODEL};
pub use gemini::{DEFAULT_GEMINI_MODEL, GeminiAdapter};
pub use scripted::ScriptedModelAdapter;
