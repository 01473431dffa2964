//! Port contracts for model inference.

mod model;

pub use model::{AdapterError, AdapterResult, ModelAdapter};
