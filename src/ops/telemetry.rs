use anyhow::Result;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::reload;

pub type LogHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

/// Initialize JSON logging on stderr with a reloadable level.
pub fn init_tracing(log_level: Option<&str>) -> Result<LogHandle> {
    let level = log_level.unwrap_or("info");
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(filter);
    let fmt_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_timer(fmt::time::UtcTime::rfc_3339());
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to init tracing: {e}"))?;
    Ok(handle)
}

/// Swap the active filter; returns false when the directive does not parse.
pub fn set_log_level(handle: &LogHandle, level: &str) -> bool {
    match EnvFilter::try_new(level) {
        Ok(filter) => handle.modify(|f| *f = filter).is_ok(),
        Err(_) => false,
    }
}
