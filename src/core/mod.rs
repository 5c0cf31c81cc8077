//! Core runtime infrastructure.
//!
//! - `config` - Configuration parsing and validation
//! - `runtime` - Runtime orchestration and shutdown
//! - `time` - Clock abstraction (system and manual)

pub mod config;
pub mod runtime;
pub mod time;

pub use config::*;
pub use runtime::*;
pub use time::*;
