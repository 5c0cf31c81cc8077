//! Run command - interactive registration from the terminal.

use super::load_config;
use crate::cli::args::RunArgs;
use crate::cli::console::{self, ConsoleObserver};
use crate::lottery::{LotterySession, SessionParams, SessionPhase};
use crate::runtime::Runtime;
use crate::telemetry;
use crate::time::{Clock, SystemClock};
use anyhow::Result;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tokio::sync::mpsc;

const INPUT_BUFFER: usize = 16;

pub async fn run_run(args: RunArgs) -> Result<()> {
    let config = load_config(&args.common)?;
    // Keep the terminal readable unless a level was asked for.
    let level = config.telemetry.log_level.as_deref().unwrap_or("warn");
    let log_handle = telemetry::init_tracing(Some(level))?;
    let mut runtime = Runtime::with_observer(
        config,
        SystemClock,
        Arc::new(ConsoleObserver),
        Some(log_handle),
    )?;
    let session = runtime.session();
    let params = SessionParams::scaled(runtime.config().window.default_time_scale);
    let timing = params.timing(session.window_config())?;
    session.start_session(params)?;
    println!("{}", console::render_banner(timing.base, params.time_scale));

    let input = spawn_stdin_reader();
    let mut out = std::io::stdout();
    tokio::select! {
        res = prompt(&session, input, &mut out) => res?,
        _ = tokio::signal::ctrl_c() => {
            println!("\nProgram interrupted. Saving progress...");
        }
    }
    runtime.shutdown().await?;
    Ok(())
}

/// Read stdin on its own thread so a pending read never holds up shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(INPUT_BUFFER);
    std::thread::spawn(move || forward_lines(std::io::stdin().lock(), &tx));
    rx
}

/// Push lines from `reader` into `tx` until EOF, a read error or a dropped
/// receiver. Blocks the calling thread.
pub fn forward_lines<R: BufRead>(reader: R, tx: &mpsc::Sender<String>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!("failed to read registration input: {err}");
                break;
            }
        };
        if tx.blocking_send(line).is_err() {
            break;
        }
    }
}

/// Register usernames from `input` until the window closes.
///
/// A blank line re-renders the remaining time. Once every sender is dropped
/// the prompt keeps waiting for the timer to close the window.
pub async fn prompt<C, W>(
    session: &LotterySession<C>,
    mut input: mpsc::Receiver<String>,
    out: &mut W,
) -> Result<()>
where
    C: Clock,
    W: Write,
{
    let mut phase = session.subscribe();
    while session.phase().accepting() {
        tokio::select! {
            changed = phase.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            line = input.recv() => match line {
                Some(line) => handle_line(session, &line, out)?,
                None => {
                    let _ = phase.wait_for(|p| !p.accepting()).await;
                    break;
                }
            }
        }
    }
    writeln!(out, "{}", console::render_closed())?;
    Ok(())
}

fn handle_line<C: Clock, W: Write>(
    session: &LotterySession<C>,
    line: &str,
    out: &mut W,
) -> Result<()> {
    if line.trim().is_empty() {
        let status = session.status();
        writeln!(
            out,
            "{}",
            console::render_remaining(
                status.phase == SessionPhase::Extended,
                status.time_remaining,
                status.participant_count
            )
        )?;
        return Ok(());
    }
    let outcome = session.register_participant(line);
    if outcome.ok() {
        writeln!(out, "{}", outcome.message())?;
        writeln!(out, "Total registered users: {}", outcome.total_users)?;
    } else {
        writeln!(out, "Error: {}", outcome.message())?;
    }
    out.flush()?;
    Ok(())
}
