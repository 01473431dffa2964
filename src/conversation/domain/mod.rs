//! Domain model for the operator/model conversation.
//!
//! The conversation is an append-only history of operator text, model text,
//! tool call requests, and tool results. Decoded model responses are
//! represented by [`ModelTurn`] independently of any provider wire format.

mod error;
mod history;
mod ids;
mod model_turn;
mod turn;

pub use error::ConversationDomainError;
pub use history::Conversation;
pub use ids::ToolCallId;
pub use model_turn::{ModelTurn, RequestedToolCall};
pub use turn::{ConversationTurn, TurnRole};
