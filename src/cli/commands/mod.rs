//! CLI command implementations.

mod check;
mod run;
mod serve;

use crate::cli::args::CommonArgs;
use crate::config::Config;
use anyhow::Result;
use std::env;

pub use check::run_check;
pub use run::{forward_lines, prompt, run_run};
pub use serve::run_serve;

/// Load the file/env configuration, then layer the command-line flags on top.
pub fn load_config(common: &CommonArgs) -> Result<Config> {
    // Config::load_from_env reads the path from LOTTERY_CONFIG
    if let Some(path) = &common.config {
        env::set_var("LOTTERY_CONFIG", path.display().to_string());
    }
    let mut config = Config::load_from_env()?;
    apply_overrides(&mut config, common);
    config.validate()?;
    Ok(config)
}

pub fn apply_overrides(config: &mut Config, common: &CommonArgs) {
    if let Some(scale) = common.time_scale {
        config.window.default_time_scale = scale;
    }
    if let Some(path) = &common.audit_log {
        config.audit.log_path = path.clone();
    }
    if common.no_audit {
        config.audit.enabled = false;
    }
    if let Some(seed) = common.seed {
        config.draw.seed = Some(seed);
    }
    if let Some(level) = &common.log_level {
        config.telemetry.log_level = Some(level.clone());
    }
}
