//! Step-executor client.

pub mod http;

pub use http::HttpStepExecutor;
