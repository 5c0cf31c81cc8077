use super::draw::DrawResult;
use super::window::WindowState;
use std::time::Duration;

/// Periodic remaining-time view handed to the display hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowProgress {
    pub state: WindowState,
    pub time_remaining: Duration,
    pub participant_count: usize,
    pub extension_used: bool,
}

/// Presentation hooks fired from the timer path.
///
/// Called while the session lock is held, so implementations must not call
/// back into the session.
pub trait WindowObserver: Send + Sync {
    fn on_progress(&self, _progress: &WindowProgress) {}
    fn on_extended(&self, _participants: usize, _extension: Duration) {}
    fn on_closed(&self, _result: &DrawResult) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl WindowObserver for NoopObserver {}
