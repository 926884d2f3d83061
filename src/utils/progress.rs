//! Spinners for network waits

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner for indefinite progress (e.g., waiting for the browser)
///
/// The spinner draws to stderr and is hidden when stderr is not a terminal.
#[must_use]
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(120));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(
            style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
    }
    spinner.set_message(message.to_string());
    spinner
}

/// A spinner, or a hidden bar when output is machine-readable
#[must_use]
pub fn spinner_for(message: &str, show: bool) -> ProgressBar {
    if show {
        create_spinner(message)
    } else {
        ProgressBar::hidden()
    }
}

pub fn finish_progress_success(progress: &ProgressBar, message: &str) {
    progress.finish_with_message(format!("✓ {message}"));
}

pub fn finish_progress_error(progress: &ProgressBar, message: &str) {
    progress.finish_with_message(format!("✗ {message}"));
}
