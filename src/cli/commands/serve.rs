//! Serve command - runs the HTTP endpoint.

use super::load_config;
use crate::cli::args::ServeArgs;
use crate::lottery::SessionParams;
use crate::runtime::Runtime;
use crate::telemetry;
use crate::time::SystemClock;
use anyhow::Result;

pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut config = load_config(&args.common)?;
    if let Some(bind) = args.bind {
        config.http.bind = bind;
    }
    let log_handle = telemetry::init_tracing(config.telemetry.log_level.as_deref())?;
    let mut runtime = Runtime::new(config, SystemClock, Some(log_handle))?;
    if args.autostart {
        let scale = runtime.config().window.default_time_scale;
        runtime.session().start_session(SessionParams::scaled(scale))?;
    }
    runtime.serve().await
}
