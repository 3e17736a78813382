//! Terminal progress display.

use std::time::Duration;

use chainboot::progress::ProgressSink;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str = "{spinner:.cyan} [{bar:40.cyan/blue}] {pos:>3}% {msg}";

/// [`ProgressSink`] drawing an `indicatif` bar on stderr.
#[derive(Clone)]
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        if let Ok(template) = ProgressStyle::with_template(TEMPLATE) {
            bar.set_style(template.progress_chars("=> "));
        }
        Self { bar }
    }

    /// Hidden bar, for non-interactive use.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Advance the spinner; called from the render loop.
    pub fn tick(&self) {
        self.bar.tick();
    }

    /// Remove the bar from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleProgress {
    fn set_status_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn set_progress(&self, percent: u8) {
        self.bar.set_position(u64::from(percent.min(100)));
    }

    fn set_large_message(&self, message: &str) {
        self.bar
            .println(format!("{} {}", style("==>").cyan().bold(), style(message).bold()));
    }
}

/// Render interval for the main-thread loop.
pub const RENDER_INTERVAL: Duration = Duration::from_millis(100);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_progress_accepts_updates() {
        let progress = ConsoleProgress::hidden();
        progress.set_large_message("Installing components");
        progress.set_status_message("Installing runtime.msi");
        progress.set_progress(150);
        progress.tick();
        progress.finish();
    }
}
