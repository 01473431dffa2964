//! Application services for the conversation.
//!
//! The conversation loop interleaves model inference with tool dispatch and
//! keeps the history consistent across cancellations and failures.

mod turn_loop;


pub use turn_loop::{
    Completion, ConversationLoop, ConversationLoopError, DispatchRecord, LoopConfig, LoopState,
    TurnOutcome,
};
