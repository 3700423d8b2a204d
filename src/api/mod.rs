//! Quiz platform REST API: typed requests, responses and endpoint wrappers.

mod client;
mod types;

pub use client::QuizApi;
pub use types::*;
