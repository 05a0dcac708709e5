//! Thin wrappers around `indicatif`, gated on whether stderr is a terminal.
//!
//! Mirrors `examples/JaviSoto-apple-notes-cli/src/progress.rs`'s
//! `spinner`/`bar` helpers: progress bars are cosmetic and never required
//! for correctness, so they are disabled outright when stderr isn't a
//! terminal or `NO_PROGRESS` is set.

use std::io::IsTerminal;

use indicatif::{ProgressBar, ProgressStyle};

fn enabled() -> bool {
    if std::env::var_os("NO_PROGRESS").is_some() {
        return false;
    }
    if std::env::var_os("_FORCE_PROGRESS").is_some() {
        return true;
    }
    std::io::stderr().is_terminal()
}

/// A determinate progress bar for a phase with a known item count (note
/// write-out, media copy).
pub fn bar(len: u64, message: &str) -> ProgressBar {
    if !enabled() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
            .unwrap()
            .progress_chars("=> "),
    );
    pb.set_message(message.to_string());
    pb
}

/// An indeterminate spinner for a phase without a known item count.
pub fn spinner(message: &str) -> ProgressBar {
    if !enabled() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
