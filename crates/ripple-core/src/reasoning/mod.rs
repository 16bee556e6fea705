//! External reasoning: backend trait, HTTP backend, output validation and
//! the retrying client.

pub mod backend;
pub mod client;
pub mod http;
pub mod parse;

pub use backend::{BackendError, ReasoningBackend};
pub use client::ReasoningClient;
pub use http::HttpReasoningBackend;
pub use parse::{parse_analysis, OutputBounds};
