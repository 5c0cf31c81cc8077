use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "config/lottery.toml";

/// Top-level configuration for the lottery runtime.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub draw: DrawConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Unscaled window durations; every value is multiplied by the session's time
/// scale when a window opens.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_base_duration")]
    pub base_duration_seconds: f64,
    #[serde(default = "default_extension_duration")]
    pub extension_duration_seconds: f64,
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_seconds: f64,
    #[serde(default = "default_display_interval")]
    pub display_interval_seconds: f64,
    #[serde(default = "default_min_participants")]
    pub min_participants_for_no_extension: usize,
    /// Real-time period of the timer task.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_time_scale")]
    pub default_time_scale: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            base_duration_seconds: default_base_duration(),
            extension_duration_seconds: default_extension_duration(),
            snapshot_interval_seconds: default_snapshot_interval(),
            display_interval_seconds: default_display_interval(),
            min_participants_for_no_extension: default_min_participants(),
            tick_interval_ms: default_tick_interval_ms(),
            default_time_scale: default_time_scale(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DrawConfig {
    /// Fixed RNG seed for reproducible draws.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    #[serde(default = "default_audit_path")]
    pub log_path: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            log_path: default_audit_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_bind")]
    pub bind: String,
    /// Budget for reading one request off the socket.
    #[serde(default = "default_http_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_http_bind(),
            read_timeout_ms: default_http_read_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub log_level: Option<String>,
}

fn default_base_duration() -> f64 {
    3600.0
}

fn default_extension_duration() -> f64 {
    1800.0
}

fn default_snapshot_interval() -> f64 {
    300.0
}

fn default_display_interval() -> f64 {
    600.0
}

fn default_min_participants() -> usize {
    5
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_http_read_timeout_ms() -> u64 {
    10_000
}

fn default_time_scale() -> f64 {
    1.0
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_path() -> PathBuf {
    PathBuf::from("lottery_log.txt")
}

fn default_http_bind() -> String {
    "0.0.0.0:5000".to_string()
}

impl Config {
    /// Load configuration from LOTTERY_CONFIG or `config/lottery.toml`, falling
    /// back to defaults when the default path is absent, then apply env overrides.
    pub fn load_from_env() -> Result<Self> {
        let explicit = std::env::var("LOTTERY_CONFIG").ok().map(PathBuf::from);
        let mut cfg = match explicit {
            Some(path) => Self::load(&path)?,
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::load(&path)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    /// Load configuration from a specific file (TOML or JSON based on extension).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let data = fs::read_to_string(path_ref)
            .with_context(|| format!("unable to read config {}", path_ref.display()))?;
        if is_json(path_ref) {
            Ok(serde_json::from_str(&data)
                .with_context(|| format!("invalid JSON config {}", path_ref.display()))?)
        } else {
            Ok(toml::from_str(&data)
                .with_context(|| format!("invalid TOML config {}", path_ref.display()))?)
        }
    }

    pub fn validate(&self) -> Result<()> {
        let w = &self.window;
        for (name, value) in [
            ("window.base_duration_seconds", w.base_duration_seconds),
            ("window.extension_duration_seconds", w.extension_duration_seconds),
            ("window.snapshot_interval_seconds", w.snapshot_interval_seconds),
            ("window.display_interval_seconds", w.display_interval_seconds),
            ("window.default_time_scale", w.default_time_scale),
        ] {
            if !value.is_finite() || value <= 0.0 {
                bail!("{name} must be a positive number, got {value}");
            }
        }
        if w.tick_interval_ms == 0 {
            bail!("window.tick_interval_ms must be > 0");
        }
        if self.audit.enabled && self.audit.log_path.as_os_str().is_empty() {
            bail!("audit.log_path must be non-empty when audit is enabled");
        }
        if self.http.bind.is_empty() {
            bail!("http.bind must be non-empty");
        }
        if self.http.read_timeout_ms == 0 {
            bail!("http.read_timeout_ms must be > 0");
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(scale) = std::env::var("LOTTERY_TIME_SCALE") {
            self.window.default_time_scale = scale
                .parse()
                .with_context(|| format!("invalid LOTTERY_TIME_SCALE {scale}"))?;
        }
        if let Ok(bind) = std::env::var("LOTTERY_HTTP_BIND") {
            self.http.bind = bind;
        }
        if let Ok(path) = std::env::var("LOTTERY_AUDIT_LOG") {
            self.audit.log_path = PathBuf::from(path);
        }
        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
