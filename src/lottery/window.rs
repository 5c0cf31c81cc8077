//! Registration window state machine.
//!
//! ```text
//! Open --(end reached, count >= min)--------------------> Closed
//! Open --(end reached, count < min, no extension yet)--> Extended --(end reached)--> Closed
//! ```
//!
//! `tick` is the only path that moves time forward; `close` is the single
//! termination path shared by natural expiry and forced stops. The draw runs
//! inside `close`, guarded by the state so it happens once per window.

use super::draw::{DrawResult, Drawer};
use super::observer::{WindowObserver, WindowProgress};
use super::registry::{Registrant, RegistrationError, Registry};
use crate::audit::{AuditError, AuditSink};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowState {
    Open,
    Extended,
    Closed,
}

impl WindowState {
    pub fn accepting(self) -> bool {
        matches!(self, Self::Open | Self::Extended)
    }
}

/// Scaled durations for one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowTiming {
    pub base: Duration,
    pub extension: Duration,
    pub snapshot_interval: Duration,
    pub display_interval: Duration,
    pub min_participants: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Elapsed,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Extended,
    Closed(DrawResult),
}

pub struct WindowController {
    timing: WindowTiming,
    state: WindowState,
    started_at: Instant,
    end: Instant,
    extension_used: bool,
    registry: Registry,
    drawer: Drawer,
    result: Option<DrawResult>,
    last_snapshot: Instant,
    last_display: Option<Instant>,
    audit: Arc<dyn AuditSink>,
    observer: Arc<dyn WindowObserver>,
    audit_failures: u64,
}

impl WindowController {
    pub fn open(
        timing: WindowTiming,
        now: Instant,
        drawer: Drawer,
        audit: Arc<dyn AuditSink>,
        observer: Arc<dyn WindowObserver>,
    ) -> Self {
        Self {
            timing,
            state: WindowState::Open,
            started_at: now,
            end: now + timing.base,
            extension_used: false,
            registry: Registry::new(),
            drawer,
            result: None,
            last_snapshot: now,
            last_display: None,
            audit,
            observer,
            audit_failures: 0,
        }
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn timing(&self) -> &WindowTiming {
        &self.timing
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn end_time(&self) -> Instant {
        self.end
    }

    pub fn extension_used(&self) -> bool {
        self.extension_used
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn result(&self) -> Option<&DrawResult> {
        self.result.as_ref()
    }

    pub fn audit_failures(&self) -> u64 {
        self.audit_failures
    }

    /// Remaining time until the current end; zero once closed.
    pub fn time_remaining(&self, now: Instant) -> Duration {
        if self.state == WindowState::Closed {
            return Duration::ZERO;
        }
        self.end.saturating_duration_since(now)
    }

    pub fn progress(&self, now: Instant) -> WindowProgress {
        WindowProgress {
            state: self.state,
            time_remaining: self.time_remaining(now),
            participant_count: self.registry.count(),
            extension_used: self.extension_used,
        }
    }

    /// Write the session header for a freshly opened window.
    pub fn announce(&mut self, time_scale: f64, wall: DateTime<Utc>) {
        let outcome = self.audit.append_session_started(
            time_scale,
            self.timing.base,
            self.timing.extension,
            wall,
        );
        self.note("session_started", outcome);
    }

    pub fn register(
        &mut self,
        raw: &str,
        at: DateTime<Utc>,
    ) -> Result<Registrant, RegistrationError> {
        if !self.state.accepting() {
            return Err(RegistrationError::RegistrationClosed);
        }
        let registrant = self.registry.register(raw, at)?;
        let outcome = self
            .audit
            .append_registration(registrant.username.as_str(), at);
        self.note("registration", outcome);
        Ok(registrant)
    }

    pub fn tick(&mut self, now: Instant, wall: DateTime<Utc>) -> TickOutcome {
        if !self.state.accepting() {
            return TickOutcome::Idle;
        }
        if now < self.end {
            self.fire_periodic(now, wall);
            return TickOutcome::Idle;
        }
        let low = self.registry.count() < self.timing.min_participants;
        if self.state == WindowState::Open && low && !self.extension_used {
            self.extend(now, wall);
            return TickOutcome::Extended;
        }
        match self.close(wall, CloseReason::Elapsed) {
            Some(result) => TickOutcome::Closed(result),
            None => TickOutcome::Idle,
        }
    }

    /// Move to Closed, write the final snapshot and draw. Returns `None` if the
    /// window was already closed.
    pub fn close(&mut self, wall: DateTime<Utc>, reason: CloseReason) -> Option<DrawResult> {
        if !self.state.accepting() {
            return None;
        }
        self.state = WindowState::Closed;
        tracing::info!(
            ?reason,
            participants = self.registry.count(),
            extension_used = self.extension_used,
            "registration window closed"
        );
        let outcome = self.audit.append_snapshot(self.registry.as_slice(), wall);
        self.note("snapshot", outcome);
        let result = self.drawer.select(self.registry.as_slice(), wall);
        if result.cancelled() {
            let outcome = self.audit.append_cancelled(wall);
            self.note("cancelled", outcome);
        } else {
            let outcome = self.audit.append_result(&result);
            self.note("result", outcome);
        }
        self.result = Some(result.clone());
        self.observer.on_closed(&result);
        Some(result)
    }

    fn extend(&mut self, now: Instant, wall: DateTime<Utc>) {
        let participants = self.registry.count();
        self.state = WindowState::Extended;
        self.extension_used = true;
        self.end = now + self.timing.extension;
        tracing::info!(
            participants,
            minimum = self.timing.min_participants,
            extension_secs = self.timing.extension.as_secs_f64(),
            "low participation; extending registration window"
        );
        let outcome = self
            .audit
            .append_extension(wall, participants, self.timing.extension);
        self.note("extension", outcome);
        self.observer.on_extended(participants, self.timing.extension);
    }

    fn fire_periodic(&mut self, now: Instant, wall: DateTime<Utc>) {
        if now.duration_since(self.last_snapshot) >= self.timing.snapshot_interval {
            self.last_snapshot = now;
            let outcome = self.audit.append_snapshot(self.registry.as_slice(), wall);
            self.note("snapshot", outcome);
        }
        let display_due = self
            .last_display
            .map_or(true, |last| now.duration_since(last) >= self.timing.display_interval);
        if display_due {
            self.last_display = Some(now);
            self.observer.on_progress(&self.progress(now));
        }
    }

    fn note(&mut self, event: &'static str, outcome: Result<(), AuditError>) {
        if let Err(err) = outcome {
            self.audit_failures += 1;
            tracing::warn!(event, "audit append failed: {err}");
        }
    }
}

impl std::fmt::Debug for WindowController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowController")
            .field("state", &self.state)
            .field("extension_used", &self.extension_used)
            .field("participants", &self.registry.count())
            .field("result", &self.result)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditRecord, MemoryAuditSink};
    use crate::lottery::observer::NoopObserver;
    use parking_lot::Mutex;

    fn timing() -> WindowTiming {
        WindowTiming {
            base: Duration::from_secs(3600),
            extension: Duration::from_secs(1800),
            snapshot_interval: Duration::from_secs(300),
            display_interval: Duration::from_secs(600),
            min_participants: 5,
        }
    }

    fn controller(sink: &MemoryAuditSink, now: Instant) -> WindowController {
        WindowController::open(
            timing(),
            now,
            Drawer::seeded(3),
            Arc::new(sink.clone()),
            Arc::new(NoopObserver),
        )
    }

    fn register_all(ctrl: &mut WindowController, names: &[&str]) {
        for name in names {
            ctrl.register(name, Utc::now()).unwrap();
        }
    }

    #[derive(Default)]
    struct Recorder {
        progress: Mutex<Vec<WindowProgress>>,
        extended: Mutex<usize>,
        closed: Mutex<Vec<DrawResult>>,
    }

    impl WindowObserver for Recorder {
        fn on_progress(&self, progress: &WindowProgress) {
            self.progress.lock().push(*progress);
        }
        fn on_extended(&self, _participants: usize, _extension: Duration) {
            *self.extended.lock() += 1;
        }
        fn on_closed(&self, result: &DrawResult) {
            self.closed.lock().push(result.clone());
        }
    }

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn write(&self, _record: &AuditRecord) -> Result<(), AuditError> {
            Err(AuditError::Unavailable("disk full".into()))
        }
    }

    #[test]
    fn opens_with_base_duration() {
        let sink = MemoryAuditSink::default();
        let t0 = Instant::now();
        let ctrl = controller(&sink, t0);
        assert_eq!(ctrl.state(), WindowState::Open);
        assert_eq!(ctrl.end_time(), t0 + Duration::from_secs(3600));
        assert_eq!(ctrl.time_remaining(t0), Duration::from_secs(3600));
        assert!(!ctrl.extension_used());
    }

    #[test]
    fn no_transition_before_end() {
        let sink = MemoryAuditSink::default();
        let t0 = Instant::now();
        let mut ctrl = controller(&sink, t0);
        assert_eq!(
            ctrl.tick(t0 + Duration::from_secs(3599), Utc::now()),
            TickOutcome::Idle
        );
        assert_eq!(ctrl.state(), WindowState::Open);
    }

    #[test]
    fn low_participation_extends_once_then_closes() {
        let sink = MemoryAuditSink::default();
        let t0 = Instant::now();
        let mut ctrl = controller(&sink, t0);
        register_all(&mut ctrl, &["alice", "bob"]);

        let end = ctrl.end_time();
        assert_eq!(ctrl.tick(end, Utc::now()), TickOutcome::Extended);
        assert_eq!(ctrl.state(), WindowState::Extended);
        assert!(ctrl.extension_used());
        assert_eq!(ctrl.end_time(), end + Duration::from_secs(1800));
        assert_eq!(sink.count("extension"), 1);

        // Still registering during the extension.
        ctrl.register("carol", Utc::now()).unwrap();

        let second_end = ctrl.end_time();
        match ctrl.tick(second_end, Utc::now()) {
            TickOutcome::Closed(result) => {
                assert_eq!(result.total_participants, 3);
                let winner = result.winner.unwrap();
                assert!(["alice", "bob", "carol"].contains(&winner.username.as_str()));
            }
            other => panic!("expected close, got {other:?}"),
        }
        assert_eq!(ctrl.state(), WindowState::Closed);
        assert_eq!(sink.count("extension"), 1);
        assert_eq!(sink.count("result"), 1);
    }

    #[test]
    fn enough_participants_close_directly() {
        let sink = MemoryAuditSink::default();
        let t0 = Instant::now();
        let mut ctrl = controller(&sink, t0);
        register_all(&mut ctrl, &["a1", "a2", "a3", "a4", "a5"]);
        let outcome = ctrl.tick(ctrl.end_time(), Utc::now());
        assert!(matches!(outcome, TickOutcome::Closed(_)));
        assert!(!ctrl.extension_used());
        assert_eq!(sink.count("extension"), 0);
    }

    #[test]
    fn closed_window_rejects_and_never_mutates() {
        let sink = MemoryAuditSink::default();
        let t0 = Instant::now();
        let mut ctrl = controller(&sink, t0);
        register_all(&mut ctrl, &["solo"]);
        ctrl.close(Utc::now(), CloseReason::Stopped).unwrap();
        let records = sink.len();
        assert_eq!(
            ctrl.register("late", Utc::now()),
            Err(RegistrationError::RegistrationClosed)
        );
        assert_eq!(
            ctrl.register("", Utc::now()),
            Err(RegistrationError::RegistrationClosed)
        );
        assert_eq!(ctrl.registry().count(), 1);
        assert_eq!(sink.len(), records);
        assert_eq!(ctrl.time_remaining(t0), Duration::ZERO);
    }

    #[test]
    fn draw_happens_once() {
        let sink = MemoryAuditSink::default();
        let t0 = Instant::now();
        let mut ctrl = controller(&sink, t0);
        register_all(&mut ctrl, &["a", "b", "c", "d", "e", "f"]);
        let first = ctrl.close(Utc::now(), CloseReason::Stopped);
        assert!(first.is_some());
        assert!(ctrl.close(Utc::now(), CloseReason::Stopped).is_none());
        assert_eq!(
            ctrl.tick(t0 + Duration::from_secs(99_999), Utc::now()),
            TickOutcome::Idle
        );
        assert_eq!(sink.count("result"), 1);
        assert_eq!(ctrl.result(), first.as_ref());
    }

    #[test]
    fn empty_close_is_cancelled() {
        let sink = MemoryAuditSink::default();
        let t0 = Instant::now();
        let mut ctrl = controller(&sink, t0);
        assert_eq!(ctrl.tick(ctrl.end_time(), Utc::now()), TickOutcome::Extended);
        match ctrl.tick(ctrl.end_time(), Utc::now()) {
            TickOutcome::Closed(result) => {
                assert!(result.winner.is_none());
                assert_eq!(result.total_participants, 0);
            }
            other => panic!("expected close, got {other:?}"),
        }
        assert_eq!(sink.count("cancelled"), 1);
        assert_eq!(sink.count("result"), 0);
    }

    #[test]
    fn final_snapshot_precedes_result() {
        let sink = MemoryAuditSink::default();
        let mut ctrl = controller(&sink, Instant::now());
        register_all(&mut ctrl, &["x"]);
        ctrl.close(Utc::now(), CloseReason::Stopped);
        let kinds: Vec<_> = sink.records().iter().map(|r| r.kind()).collect();
        assert_eq!(kinds, ["registration", "snapshot", "result"]);
    }

    #[test]
    fn periodic_hooks_follow_their_own_intervals() {
        let sink = MemoryAuditSink::default();
        let recorder = Arc::new(Recorder::default());
        let t0 = Instant::now();
        let mut ctrl = WindowController::open(
            timing(),
            t0,
            Drawer::seeded(1),
            Arc::new(sink.clone()),
            recorder.clone(),
        );
        // One simulated tick per second over the first 20 minutes.
        for s in 1..=1200 {
            ctrl.tick(t0 + Duration::from_secs(s), Utc::now());
        }
        // Snapshots at 300/600/900/1200s; displays at 1s, 601s.
        assert_eq!(sink.count("snapshot"), 4);
        let progress = recorder.progress.lock();
        assert_eq!(progress.len(), 2);
        assert_eq!(progress[0].time_remaining, Duration::from_secs(3599));
        assert_eq!(progress[1].time_remaining, Duration::from_secs(2999));
    }

    #[test]
    fn observer_sees_extension_and_close() {
        let sink = MemoryAuditSink::default();
        let recorder = Arc::new(Recorder::default());
        let t0 = Instant::now();
        let mut ctrl = WindowController::open(
            timing(),
            t0,
            Drawer::seeded(1),
            Arc::new(sink),
            recorder.clone(),
        );
        ctrl.register("alice", Utc::now()).unwrap();
        ctrl.tick(ctrl.end_time(), Utc::now());
        ctrl.tick(ctrl.end_time(), Utc::now());
        assert_eq!(*recorder.extended.lock(), 1);
        assert_eq!(recorder.closed.lock().len(), 1);
    }

    #[test]
    fn audit_failures_do_not_block_state() {
        let t0 = Instant::now();
        let mut ctrl = WindowController::open(
            timing(),
            t0,
            Drawer::seeded(1),
            Arc::new(FailingSink),
            Arc::new(NoopObserver),
        );
        ctrl.register("alice", Utc::now()).unwrap();
        assert_eq!(ctrl.registry().count(), 1);
        assert_eq!(ctrl.tick(ctrl.end_time(), Utc::now()), TickOutcome::Extended);
        let closed = ctrl.tick(ctrl.end_time(), Utc::now());
        assert!(matches!(closed, TickOutcome::Closed(_)));
        // registration + extension + snapshot + result
        assert_eq!(ctrl.audit_failures(), 4);
    }
}
