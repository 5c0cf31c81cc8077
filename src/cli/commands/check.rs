//! Check command - validates configuration and prints effective timing.

use super::load_config;
use crate::cli::args::CheckArgs;
use crate::lottery::SessionParams;
use anyhow::Result;
use serde_json::json;

pub fn run_check(args: CheckArgs) -> Result<()> {
    let config = load_config(&args.common)?;
    let scale = config.window.default_time_scale;
    let timing = SessionParams::scaled(scale).timing(&config.window)?;
    if args.json {
        let view = json!({
            "time_scale": scale,
            "base_seconds": timing.base.as_secs_f64(),
            "extension_seconds": timing.extension.as_secs_f64(),
            "snapshot_interval_seconds": timing.snapshot_interval.as_secs_f64(),
            "display_interval_seconds": timing.display_interval.as_secs_f64(),
            "min_participants_for_no_extension": timing.min_participants,
            "audit_log": config.audit.enabled.then(|| config.audit.log_path.display().to_string()),
            "http_bind": config.http.bind,
            "seed": config.draw.seed,
        });
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        println!("configuration ok");
        println!("  time scale:        {scale}");
        println!("  window:            {:.1}s", timing.base.as_secs_f64());
        println!("  extension:         {:.1}s", timing.extension.as_secs_f64());
        println!("  snapshot interval: {:.1}s", timing.snapshot_interval.as_secs_f64());
        println!("  display interval:  {:.1}s", timing.display_interval.as_secs_f64());
        println!("  min participants:  {}", timing.min_participants);
        if config.audit.enabled {
            println!("  audit log:         {}", config.audit.log_path.display());
        } else {
            println!("  audit log:         disabled");
        }
        println!("  http bind:         {}", config.http.bind);
    }
    Ok(())
}
