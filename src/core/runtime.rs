use crate::audit::{AuditSink, FileAuditSink, NoopAuditSink};
use crate::config::{AuditConfig, Config};
use crate::lottery::{DrawResult, LotterySession, NoopObserver, WindowObserver};
use crate::net::http::{self, HttpState};
use crate::telemetry::LogHandle;
use crate::time::Clock;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Runtime scaffold: wires config, audit sink, the lottery session, the HTTP
/// endpoint and shutdown.
pub struct Runtime<C: Clock> {
    config: Config,
    clock: C,
    session: Arc<LotterySession<C>>,
    audit: Arc<dyn AuditSink>,
    http: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    log_handle: Option<LogHandle>,
}

impl<C: Clock> Runtime<C> {
    pub fn new(config: Config, clock: C, log_handle: Option<LogHandle>) -> Result<Self> {
        Self::with_observer(config, clock, Arc::new(NoopObserver), log_handle)
    }

    pub fn with_observer(
        config: Config,
        clock: C,
        observer: Arc<dyn WindowObserver>,
        log_handle: Option<LogHandle>,
    ) -> Result<Self> {
        config.validate()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let audit = audit_sink(&config.audit);
        let session = LotterySession::new(config.window.clone(), clock.clone())
            .with_audit(audit.clone())
            .with_observer(observer)
            .with_seed(config.draw.seed);
        Ok(Self {
            config,
            clock,
            session: Arc::new(session),
            audit,
            http: None,
            shutdown_tx,
            shutdown_rx,
            log_handle,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn clock(&self) -> C {
        self.clock.clone()
    }

    pub fn session(&self) -> Arc<LotterySession<C>> {
        self.session.clone()
    }

    pub fn audit(&self) -> Arc<dyn AuditSink> {
        self.audit.clone()
    }

    pub fn log_handle(&self) -> Option<LogHandle> {
        self.log_handle.clone()
    }

    /// Serve the HTTP endpoint until CTRL+C or a component requests shutdown.
    pub async fn serve(&mut self) -> Result<()> {
        let addr = self.start_http().await?;
        tracing::info!(%addr, "lottery runtime serving");
        self.handle_shutdown().await.map(|_| ())
    }

    /// Bind the HTTP endpoint on the configured address.
    pub async fn start_http(&mut self) -> Result<SocketAddr> {
        let state = Arc::new(HttpState {
            session: self.session.clone(),
            default_time_scale: self.config.window.default_time_scale,
            read_timeout: Duration::from_millis(self.config.http.read_timeout_ms),
            log_handle: self.log_handle(),
        });
        let (addr, handle) =
            http::start_http(&self.config.http.bind, state, self.shutdown_rx.clone()).await?;
        self.http = Some(handle);
        Ok(addr)
    }

    pub fn request_shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Wait for CTRL+C (or a shutdown request), then close the window and drain.
    pub async fn handle_shutdown(&mut self) -> Result<Option<DrawResult>> {
        if !*self.shutdown_rx.borrow() {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("shutdown signal received");
                }
                _ = self.shutdown_rx.changed() => {
                    tracing::info!("shutdown requested by component");
                }
            }
        }
        self.shutdown().await
    }

    /// Force the window closed, stop the HTTP endpoint and return the draw.
    pub async fn shutdown(&mut self) -> Result<Option<DrawResult>> {
        tracing::info!("draining lottery runtime");
        self.shutdown_tx.send_replace(true);
        let result = self.session.stop_session().await;
        if let Some(handle) = self.http.take() {
            handle.await.context("http endpoint task failed")?;
        }
        match &result {
            Some(draw) => tracing::info!(
                winner = draw.winner.as_ref().map(|w| w.username.as_str()),
                participants = draw.total_participants,
                "lottery runtime stopped"
            ),
            None => tracing::info!("lottery runtime stopped without an active window"),
        }
        Ok(result)
    }
}

/// File sink at `log_path` when enabled, otherwise a no-op.
pub fn audit_sink(cfg: &AuditConfig) -> Arc<dyn AuditSink> {
    if cfg.enabled {
        Arc::new(FileAuditSink::new(cfg.log_path.clone()))
    } else {
        Arc::new(NoopAuditSink)
    }
}
