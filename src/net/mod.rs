//! Networking layer.
//!
//! - `http` - HTTP transport over the lottery session

pub mod http;

pub use http::{start_http, status_json, HttpState};
