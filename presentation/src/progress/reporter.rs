//! Kernel status spinner

use crate::output::console::ConsoleFormatter;
use indicatif::{ProgressBar, ProgressStyle};
use nbkernel_domain::SessionStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Shows the session status on stderr while output goes to stdout.
pub struct StatusReporter {
    bar: ProgressBar,
}

impl StatusReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(Self::spinner_style());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// A reporter that draws nothing (`--quiet`, JSON output).
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    pub fn set_prefix(&self, prefix: impl Into<String>) {
        self.bar.set_prefix(prefix.into());
    }

    pub fn update(&self, status: SessionStatus) {
        self.bar.set_message(ConsoleFormatter::status(status));
    }

    pub fn message(&self) -> String {
        self.bar.message()
    }

    /// Print a line without tearing the spinner.
    pub fn println(&self, line: &str) {
        self.bar.suspend(|| println!("{}", line));
    }

    /// Follow a session's status updates until the sender goes away.
    pub fn follow(self: &Arc<Self>, mut updates: mpsc::UnboundedReceiver<SessionStatus>) -> JoinHandle<()> {
        let reporter = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(status) = updates.recv().await {
                reporter.update(status);
            }
        })
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_follow_tracks_latest_status() {
        colored::control::set_override(false);
        let reporter = Arc::new(StatusReporter::hidden());
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = reporter.follow(rx);

        tx.send(SessionStatus::Starting).unwrap();
        tx.send(SessionStatus::Busy).unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(reporter.message(), SessionStatus::Busy.as_str());
    }
}
