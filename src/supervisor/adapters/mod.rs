//! Adapter implementations for supervisor ports.

pub mod memory;

mod http;
mod process;

pub use http::ReqwestHealthProbe;
pub use process::{TokioServerLauncher, TokioServerProcess};
