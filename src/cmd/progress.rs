//! Spinner utilities for CLI operations

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner for indeterminate operations
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Finish a spinner with a success message
pub fn finish_spinner_success(spinner: &ProgressBar, message: &str) {
    finish_with_prefix(spinner, "{prefix:.green} {msg}", "✓", message);
}

/// Finish a spinner with an error message
pub fn finish_spinner_error(spinner: &ProgressBar, message: &str) {
    finish_with_prefix(spinner, "{prefix:.red} {msg}", "✗", message);
}

fn finish_with_prefix(spinner: &ProgressBar, template: &str, prefix: &'static str, message: &str) {
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_prefix(prefix);
    spinner.finish_with_message(message.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_spinner() {
        let spinner = create_spinner("Fetching...");
        assert!(!spinner.is_finished());
        spinner.finish();
        assert!(spinner.is_finished());
    }

    #[test]
    fn test_finish_helpers() {
        let spinner = create_spinner("Working...");
        finish_spinner_success(&spinner, "Done");
        assert!(spinner.is_finished());

        let failing = create_spinner("Working...");
        finish_spinner_error(&failing, "Failed");
        assert!(failing.is_finished());
    }
}
