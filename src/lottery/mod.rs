//! Lottery core.
//!
//! - `registry` - Username validation and the ordered participant registry
//! - `window` - Registration window state machine (open, extend, close, draw)
//! - `draw` - Uniform winner selection
//! - `observer` - Display and announcement hooks for transports
//! - `session` - Lock-guarded session shared by transports and the timer task

pub mod draw;
pub mod observer;
pub mod registry;
pub mod session;
pub mod window;

pub use draw::{DrawResult, Drawer};
pub use observer::{NoopObserver, WindowObserver, WindowProgress};
pub use registry::{Registrant, RegistrationError, Registry, Username};
pub use session::{
    LotterySession, RegistrationOutcome, SessionError, SessionParams, SessionPhase, SessionStatus,
};
pub use window::{CloseReason, TickOutcome, WindowController, WindowState, WindowTiming};
