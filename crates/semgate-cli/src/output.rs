// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Colored pieces of the human report and of error lines on stderr.
//!
//! NO_COLOR turns color off, FORCE_COLOR turns it on even when piped.
//! With neither set, `colored` decides from the terminal.

use colored::{ColoredString, Colorize};

/// Which override, if any, the environment asks for. NO_COLOR wins.
fn color_override(no_color: bool, force_color: bool) -> Option<bool> {
    match (no_color, force_color) {
        (true, _) => Some(false),
        (false, true) => Some(true),
        (false, false) => None,
    }
}

/// Apply the color override before anything is printed.
pub fn init() {
    let requested = color_override(
        std::env::var_os("NO_COLOR").is_some(),
        std::env::var_os("FORCE_COLOR").is_some(),
    );
    if let Some(enabled) = requested {
        colored::control::set_override(enabled);
    }
}

pub fn error_label() -> ColoredString {
    "error".red().bold()
}

/// Prefix for the suggestion printed under a failed run.
pub fn hint_label() -> ColoredString {
    "hint".yellow()
}

// === Run Output ===

pub fn banner_ok(demo: &str) -> String {
    format!(
        "{} {} {}",
        "===".dimmed(),
        format!("{} OK", demo).green().bold(),
        "===".dimmed()
    )
}

pub fn banner_fail(demo: &str, count: usize) -> String {
    let msg = if count == 1 {
        format!("{} FAILED: 1 check", demo)
    } else {
        format!("{} FAILED: {} checks", demo, count)
    };
    format!("{} {} {}", "===".dimmed(), msg.red().bold(), "===".dimmed())
}

pub fn status_pass() -> ColoredString {
    "✓".green()
}

pub fn status_fail() -> ColoredString {
    "✗".red()
}

pub fn key(name: &str) -> ColoredString {
    name.cyan()
}

pub fn note(text: &str) -> ColoredString {
    text.dimmed()
}
