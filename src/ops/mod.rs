//! Operations and observability.
//!
//! - `audit` - Append-only audit trail and sinks
//! - `telemetry` - Tracing initialisation and runtime log level control

pub mod audit;
pub mod telemetry;

pub use audit::*;
pub use telemetry::*;
