//! Transport-facing lottery session.
//!
//! A `LotterySession` owns at most one [`WindowController`] behind a single
//! mutex. Registrations (from a prompt or HTTP handlers) and the background
//! timer both go through that lock, so a registration either lands before the
//! window closes or is rejected with `RegistrationClosed`.

use super::draw::{DrawResult, Drawer};
use super::observer::{NoopObserver, WindowObserver};
use super::registry::{Registrant, RegistrationError};
use super::window::{CloseReason, TickOutcome, WindowController, WindowState, WindowTiming};
use crate::audit::{AuditSink, NoopAuditSink};
use crate::config::WindowConfig;
use crate::time::Clock;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("time scale must be a positive finite number, got {0}")]
    InvalidTimeScale(f64),
    #[error("{0} duration is out of range")]
    InvalidDuration(&'static str),
    #[error("a registration window is already open")]
    AlreadyActive,
}

/// Parameters for one window. Durations left unset are derived from the
/// configured base values multiplied by `time_scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionParams {
    pub time_scale: f64,
    pub base: Option<Duration>,
    pub extension: Option<Duration>,
}

impl SessionParams {
    pub fn scaled(time_scale: f64) -> Self {
        Self {
            time_scale,
            base: None,
            extension: None,
        }
    }

    pub fn with_base(mut self, base: Duration) -> Self {
        self.base = Some(base);
        self
    }

    pub fn with_extension(mut self, extension: Duration) -> Self {
        self.extension = Some(extension);
        self
    }

    pub fn timing(&self, cfg: &WindowConfig) -> Result<WindowTiming, SessionError> {
        let scale = self.time_scale;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(SessionError::InvalidTimeScale(scale));
        }
        let scaled = |secs: f64, field: &'static str| {
            Duration::try_from_secs_f64(secs * scale)
                .map_err(|_| SessionError::InvalidDuration(field))
        };
        Ok(WindowTiming {
            base: match self.base {
                Some(base) => base,
                None => scaled(cfg.base_duration_seconds, "base")?,
            },
            extension: match self.extension {
                Some(extension) => extension,
                None => scaled(cfg.extension_duration_seconds, "extension")?,
            },
            snapshot_interval: scaled(cfg.snapshot_interval_seconds, "snapshot interval")?,
            display_interval: scaled(cfg.display_interval_seconds, "display interval")?,
            min_participants: cfg.min_participants_for_no_extension,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Open,
    Extended,
    Closed,
}

impl From<WindowState> for SessionPhase {
    fn from(state: WindowState) -> Self {
        match state {
            WindowState::Open => Self::Open,
            WindowState::Extended => Self::Extended,
            WindowState::Closed => Self::Closed,
        }
    }
}

impl SessionPhase {
    pub fn accepting(self) -> bool {
        matches!(self, Self::Open | Self::Extended)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationOutcome {
    pub result: Result<Registrant, RegistrationError>,
    pub total_users: usize,
}

impl RegistrationOutcome {
    pub fn ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn message(&self) -> String {
        match &self.result {
            Ok(registrant) => format!("Successfully registered user: {}", registrant.username),
            Err(err) => err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub time_remaining: Duration,
    pub participant_count: usize,
    pub participants: Vec<Registrant>,
    pub extension_used: bool,
    pub result: Option<DrawResult>,
    pub time_scale: Option<f64>,
    pub audit_failures: u64,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    time_scale: Option<f64>,
    window: Option<WindowController>,
}

struct TimerTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct LotterySession<C: Clock> {
    window: WindowConfig,
    seed: Option<u64>,
    clock: C,
    audit: Arc<dyn AuditSink>,
    observer: Arc<dyn WindowObserver>,
    slot: Arc<Mutex<Slot>>,
    phase_tx: Arc<watch::Sender<SessionPhase>>,
    timer: Mutex<Option<TimerTask>>,
}

impl<C: Clock> LotterySession<C> {
    pub fn new(window: WindowConfig, clock: C) -> Self {
        let (phase_tx, _) = watch::channel(SessionPhase::Idle);
        Self {
            window,
            seed: None,
            clock,
            audit: Arc::new(NoopAuditSink),
            observer: Arc::new(NoopObserver),
            slot: Arc::new(Mutex::new(Slot::default())),
            phase_tx: Arc::new(phase_tx),
            timer: Mutex::new(None),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn WindowObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn window_config(&self) -> &WindowConfig {
        &self.window
    }

    pub fn clock(&self) -> C {
        self.clock.clone()
    }

    /// Reset the registry, open a new window and start the timer task.
    ///
    /// Lock order is `timer` then `slot`, shared with [`Self::stop_session`].
    pub fn start_session(&self, params: SessionParams) -> Result<(), SessionError> {
        let mut timer = self.timer.lock();
        let generation = self.open_window(params)?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_timer(
            self.clock.clone(),
            self.slot.clone(),
            self.phase_tx.clone(),
            generation,
            self.tick_interval(),
            shutdown_rx,
        ));
        if let Some(previous) = timer.replace(TimerTask { shutdown, handle }) {
            previous.shutdown.send_replace(true);
        }
        Ok(())
    }

    /// Open a window without the background timer; drive it with [`Self::tick`].
    pub fn start_manual(&self, params: SessionParams) -> Result<(), SessionError> {
        let mut timer = self.timer.lock();
        self.open_window(params)?;
        if let Some(previous) = timer.take() {
            previous.shutdown.send_replace(true);
        }
        Ok(())
    }

    fn open_window(&self, params: SessionParams) -> Result<u64, SessionError> {
        let timing = params.timing(&self.window)?;
        let mut slot = self.slot.lock();
        if slot
            .window
            .as_ref()
            .is_some_and(|w| w.state().accepting())
        {
            return Err(SessionError::AlreadyActive);
        }
        let mut window = WindowController::open(
            timing,
            self.clock.now(),
            Drawer::new(self.seed),
            self.audit.clone(),
            self.observer.clone(),
        );
        window.announce(params.time_scale, self.clock.utc());
        slot.generation += 1;
        slot.time_scale = Some(params.time_scale);
        slot.window = Some(window);
        self.phase_tx.send_replace(SessionPhase::Open);
        tracing::info!(
            generation = slot.generation,
            time_scale = params.time_scale,
            base_secs = timing.base.as_secs_f64(),
            extension_secs = timing.extension.as_secs_f64(),
            "registration window opened"
        );
        Ok(slot.generation)
    }

    pub fn register_participant(&self, username: &str) -> RegistrationOutcome {
        let mut slot = self.slot.lock();
        let outcome = match slot.window.as_mut() {
            Some(window) => {
                let result = window.register(username, self.clock.utc());
                RegistrationOutcome {
                    result,
                    total_users: window.registry().count(),
                }
            }
            None => RegistrationOutcome {
                result: Err(RegistrationError::RegistrationClosed),
                total_users: 0,
            },
        };
        drop(slot);
        match &outcome.result {
            Ok(registrant) => tracing::info!(
                username = %registrant.username,
                total = outcome.total_users,
                "participant registered"
            ),
            Err(err) => tracing::debug!(%err, "registration rejected"),
        }
        outcome
    }

    /// Advance the window against the current clock reading.
    pub fn tick(&self) -> TickOutcome {
        let mut slot = self.slot.lock();
        tick_slot(&mut slot, &self.clock, &self.phase_tx)
    }

    pub fn status(&self) -> SessionStatus {
        let slot = self.slot.lock();
        let now = self.clock.now();
        match slot.window.as_ref() {
            Some(window) => SessionStatus {
                phase: window.state().into(),
                time_remaining: window.time_remaining(now),
                participant_count: window.registry().count(),
                participants: window.registry().snapshot(),
                extension_used: window.extension_used(),
                result: window.result().cloned(),
                time_scale: slot.time_scale,
                audit_failures: window.audit_failures(),
            },
            None => SessionStatus {
                phase: SessionPhase::Idle,
                time_remaining: Duration::ZERO,
                participant_count: 0,
                participants: Vec::new(),
                extension_used: false,
                result: None,
                time_scale: None,
                audit_failures: 0,
            },
        }
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    /// Force the window closed (final snapshot + draw) and stop the timer.
    ///
    /// Idempotent: an already-closed window returns its existing result, an
    /// idle session returns `None`.
    pub async fn stop_session(&self) -> Option<DrawResult> {
        let (result, timer) = {
            let mut timer = self.timer.lock();
            let mut slot = self.slot.lock();
            let wall = self.clock.utc();
            let result = match slot.window.as_mut() {
                Some(window) => {
                    let result = window
                        .close(wall, CloseReason::Stopped)
                        .or_else(|| window.result().cloned());
                    self.phase_tx.send_replace(SessionPhase::Closed);
                    result
                }
                None => None,
            };
            (result, timer.take())
        };
        if let Some(timer) = timer {
            timer.shutdown.send_replace(true);
            if let Err(err) = timer.handle.await {
                tracing::warn!("window timer task failed: {err}");
            }
        }
        result
    }

    fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.window.tick_interval_ms.max(1))
    }
}

impl<C: Clock> Drop for LotterySession<C> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.shutdown.send_replace(true);
        }
    }
}

fn tick_slot<C: Clock>(
    slot: &mut Slot,
    clock: &C,
    phase_tx: &watch::Sender<SessionPhase>,
) -> TickOutcome {
    let Some(window) = slot.window.as_mut() else {
        return TickOutcome::Idle;
    };
    let outcome = window.tick(clock.now(), clock.utc());
    match &outcome {
        TickOutcome::Idle => {}
        TickOutcome::Extended => {
            phase_tx.send_replace(SessionPhase::Extended);
        }
        TickOutcome::Closed(_) => {
            phase_tx.send_replace(SessionPhase::Closed);
        }
    }
    outcome
}

async fn run_timer<C: Clock>(
    clock: C,
    slot: Arc<Mutex<Slot>>,
    phase_tx: Arc<watch::Sender<SessionPhase>>,
    generation: u64,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::debug!(generation, ?interval, "window timer started");
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                tracing::debug!(generation, "window timer cancelled");
                break;
            }
            () = clock.sleep(interval) => {}
        }
        let accepting = {
            let mut slot = slot.lock();
            if slot.generation != generation {
                break;
            }
            tick_slot(&mut slot, &clock, &phase_tx);
            slot.window.as_ref().is_some_and(|w| w.state().accepting())
        };
        if !accepting {
            break;
        }
    }
    tracing::debug!(generation, "window timer finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::time::ManualClock;

    fn session(clock: &ManualClock) -> (LotterySession<ManualClock>, MemoryAuditSink) {
        let sink = MemoryAuditSink::default();
        let session = LotterySession::new(WindowConfig::default(), clock.clone())
            .with_audit(Arc::new(sink.clone()))
            .with_seed(Some(11));
        (session, sink)
    }

    #[test]
    fn timing_scales_every_duration() {
        let timing = SessionParams::scaled(0.01)
            .timing(&WindowConfig::default())
            .unwrap();
        assert_eq!(timing.base, Duration::from_secs(36));
        assert_eq!(timing.extension, Duration::from_secs(18));
        assert_eq!(timing.snapshot_interval, Duration::from_secs(3));
        assert_eq!(timing.display_interval, Duration::from_secs(6));
        assert_eq!(timing.min_participants, 5);
    }

    #[test]
    fn explicit_durations_override_scale() {
        let timing = SessionParams::scaled(0.5)
            .with_base(Duration::from_secs(10))
            .with_extension(Duration::from_secs(4))
            .timing(&WindowConfig::default())
            .unwrap();
        assert_eq!(timing.base, Duration::from_secs(10));
        assert_eq!(timing.extension, Duration::from_secs(4));
        assert_eq!(timing.snapshot_interval, Duration::from_secs(150));
    }

    #[test]
    fn rejects_bad_time_scales() {
        let cfg = WindowConfig::default();
        for scale in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                SessionParams::scaled(scale).timing(&cfg),
                Err(SessionError::InvalidTimeScale(_))
            ));
        }
        assert_eq!(
            SessionParams::scaled(1e300).timing(&cfg),
            Err(SessionError::InvalidDuration("base"))
        );
    }

    #[test]
    fn idle_session_rejects_registration() {
        let clock = ManualClock::new();
        let (session, sink) = session(&clock);
        let outcome = session.register_participant("alice");
        assert_eq!(outcome.result, Err(RegistrationError::RegistrationClosed));
        assert_eq!(outcome.message(), "Registration is closed");
        assert_eq!(session.status().phase, SessionPhase::Idle);
        assert!(sink.is_empty());
    }

    #[test]
    fn manual_ticks_walk_through_extension() {
        let clock = ManualClock::new();
        let (session, sink) = session(&clock);
        session.start_manual(SessionParams::scaled(1.0)).unwrap();
        assert_eq!(sink.count("session_started"), 1);
        assert!(session.register_participant("alice").ok());
        assert!(session.register_participant("bob").ok());

        clock.advance(Duration::from_secs(3600));
        assert_eq!(session.tick(), TickOutcome::Extended);
        assert_eq!(session.phase(), SessionPhase::Extended);
        assert_eq!(
            session.status().time_remaining,
            Duration::from_secs(1800)
        );

        clock.advance(Duration::from_secs(1800));
        assert!(matches!(session.tick(), TickOutcome::Closed(_)));
        let status = session.status();
        assert_eq!(status.phase, SessionPhase::Closed);
        assert!(status.extension_used);
        let winner = status.result.unwrap().winner.unwrap();
        assert!(["alice", "bob"].contains(&winner.username.as_str()));
    }

    #[test]
    fn restart_only_after_close() {
        let clock = ManualClock::new();
        let (session, _sink) = session(&clock);
        session.start_manual(SessionParams::scaled(1.0)).unwrap();
        session.register_participant("alice");
        assert_eq!(
            session.start_manual(SessionParams::scaled(1.0)),
            Err(SessionError::AlreadyActive)
        );
        clock.advance(Duration::from_secs(3600));
        session.tick();
        clock.advance(Duration::from_secs(1800));
        session.tick();
        assert_eq!(session.phase(), SessionPhase::Closed);
        session.start_manual(SessionParams::scaled(1.0)).unwrap();
        let status = session.status();
        assert_eq!(status.phase, SessionPhase::Open);
        assert_eq!(status.participant_count, 0);
        assert!(status.result.is_none());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let clock = ManualClock::new();
        let (session, sink) = session(&clock);
        assert!(session.stop_session().await.is_none());
        session.start_manual(SessionParams::scaled(1.0)).unwrap();
        session.register_participant("alice");
        let first = session.stop_session().await.unwrap();
        let second = session.stop_session().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(sink.count("result"), 1);
        assert!(!session.register_participant("bob").ok());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_exits_once_window_stops_accepting() {
        let clock = ManualClock::new();
        let (session, _sink) = session(&clock);
        session.start_session(SessionParams::scaled(1.0)).unwrap();
        {
            let mut slot = session.slot.lock();
            let window = slot.window.as_mut().unwrap();
            assert!(window.close(clock.utc(), CloseReason::Stopped).is_some());
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
        let timer = session.timer.lock();
        assert!(timer.as_ref().unwrap().handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_restart_retires_previous_timer() {
        let clock = ManualClock::new();
        let (session, _sink) = session(&clock);
        session.start_session(SessionParams::scaled(1.0)).unwrap();
        session
            .slot
            .lock()
            .window
            .as_mut()
            .unwrap()
            .close(clock.utc(), CloseReason::Stopped);
        assert!(session.timer.lock().is_some());
        session.start_manual(SessionParams::scaled(1.0)).unwrap();
        assert!(session.timer.lock().is_none());
        assert_eq!(session.phase(), SessionPhase::Open);
    }
}
