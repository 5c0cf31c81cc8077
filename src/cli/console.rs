//! Terminal rendering for the interactive prompt.

use crate::lottery::{DrawResult, WindowObserver, WindowProgress, WindowState};
use std::time::Duration;

const RULE_WIDTH: usize = 60;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Prints periodic progress and announcements to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleObserver;

impl WindowObserver for ConsoleObserver {
    fn on_progress(&self, progress: &WindowProgress) {
        println!("{}", render_progress(progress));
    }

    fn on_extended(&self, participants: usize, extension: Duration) {
        println!("{}", render_extension(participants, extension));
    }

    fn on_closed(&self, result: &DrawResult) {
        println!("{}", render_result(result));
    }
}

pub fn render_progress(progress: &WindowProgress) -> String {
    render_remaining(
        progress.state == WindowState::Extended,
        progress.time_remaining,
        progress.participant_count,
    )
}

pub fn render_remaining(extended: bool, remaining: Duration, registered: usize) -> String {
    let label = if extended { " (extended)" } else { "" };
    let secs = remaining.as_secs();
    format!(
        "\nRegistration period{label}:\nTime remaining: {} minutes, {} seconds\nUsers registered so far: {registered}\nEnter a username to register, or just press Enter to refresh the timer",
        secs / 60,
        secs % 60,
    )
}

pub fn render_closed() -> String {
    format!("\n{rule}\nRegistration period has ended!\n{rule}", rule = rule())
}

pub fn render_extension(participants: usize, extension: Duration) -> String {
    format!(
        "\n{rule}\nOnly {participants} users registered. Extending registration by {}.\n{rule}\n",
        describe(extension),
        rule = rule()
    )
}

pub fn render_result(result: &DrawResult) -> String {
    match &result.winner {
        Some(winner) => format!(
            "\n{rule}\nLOTTERY RESULTS\n{rule}\nTotal participants: {}\nTHE WINNER IS: {}\nRegistered at: {}\n{rule}",
            result.total_participants,
            winner.username,
            winner.registered_at.format("%Y-%m-%d %H:%M:%S"),
            rule = rule()
        ),
        None => format!(
            "\n{rule}\nNo users registered for the lottery. No winner to select.\n{rule}",
            rule = rule()
        ),
    }
}

pub fn render_banner(base: Duration, time_scale: f64) -> String {
    format!(
        "{rule}\nWELCOME TO THE LOTTERY SYSTEM\n{rule}\nRegistration is open for {} (time scale {time_scale})\nEnter your username to register for the lottery\nPress Ctrl+C to exit at any time\n{rule}",
        describe(base),
        rule = rule()
    )
}

/// "30 minutes", "1 hour", "36 seconds".
fn describe(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 && secs % 3600 == 0 {
        plural(secs / 3600, "hour")
    } else if secs >= 60 && secs % 60 == 0 {
        plural(secs / 60, "minute")
    } else {
        plural(secs, "second")
    }
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}
