#![deny(unused, dead_code)]
#![deny(clippy::all, clippy::pedantic)]
// Module naming: common pattern in domain-driven code
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]
// Documentation style: many terms don't need backticks
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
// API ergonomics: prefer simplicity over must_use annotations
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
// Format strings: allow non-inlined for readability
#![allow(clippy::uninlined_format_args)]
// Numeric casts: durations and counts
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
// Control flow style
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::single_match_else)]
#![allow(clippy::manual_let_else)]
// Passing style
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::trivially_copy_pass_by_ref)]
// Option/Result patterns
#![allow(clippy::option_if_let_else)]
#![allow(clippy::map_unwrap_or)]
// Closure style
#![allow(clippy::redundant_closure_for_method_calls)]
// Unit patterns
#![allow(clippy::ignored_unit_patterns)]
// Explicit type bounds
#![allow(clippy::significant_drop_tightening)]
// Debug impl completeness
#![allow(clippy::missing_fields_in_debug)]
// Async functions that may not await yet
#![allow(clippy::unused_async)]

//! Lottery - time-boxed registration window with a single uniform random draw.
//!
//! # Module Organization
//!
//! ## Core
//! - `core::config` - Configuration parsing and validation
//! - `core::runtime` - Runtime orchestration and shutdown
//! - `core::time` - Clock abstraction
//!
//! ## Lottery
//! - `lottery::registry` - Username validation and participant registry
//! - `lottery::window` - Window state machine (open, extend, close, draw)
//! - `lottery::draw` - Uniform winner selection
//! - `lottery::session` - Shared session driven by transports and the timer
//! - `lottery::observer` - Display and announcement hooks
//!
//! ## Networking
//! - `net::http` - HTTP transport
//!
//! ## Operations
//! - `ops::audit` - Append-only audit trail
//! - `ops::telemetry` - Tracing setup and log level control

// Core infrastructure
pub mod core;

// Domain
pub mod lottery;

// Networking
pub mod net;

// Operations
pub mod ops;

// CLI
pub mod cli;

pub use self::core::{config, runtime, time};
pub use ops::{audit, telemetry};
