//! Progress reporting and warning delivery.
//!
//! Both are opt-in. Many parsers may run at once against the same terminal,
//! so a parser without a reporter or a sink writes nothing to it.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Receives user-facing warnings (e.g. unresolved variables).
pub type WarningSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Starts a progress indicator for a long-running stage.
pub trait ProgressReporter: Send + Sync {
    /// Begin reporting a stage. The returned handle ends it.
    fn start(&self, stage: &str, message: &str) -> ProgressHandle;
}

/// A running progress indicator.
///
/// Dropping the handle without calling [`ProgressHandle::success`] or
/// [`ProgressHandle::fail`] clears the indicator.
pub struct ProgressHandle {
    bar: Option<ProgressBar>,
}

impl ProgressHandle {
    /// A handle that reports nothing.
    #[must_use]
    pub const fn noop() -> Self {
        Self { bar: None }
    }

    /// Wrap an indicatif progress bar.
    #[must_use]
    pub const fn from_bar(bar: ProgressBar) -> Self {
        Self { bar: Some(bar) }
    }

    /// Mark the stage as finished successfully.
    pub fn success(mut self) {
        if let Some(bar) = self.bar.take() {
            let message = bar.message();
            bar.finish_with_message(format!("✔ {message}"));
        }
    }

    /// Mark the stage as failed.
    pub fn fail(mut self) {
        if let Some(bar) = self.bar.take() {
            let message = bar.message();
            bar.abandon_with_message(format!("✘ {message}"));
        }
    }
}

impl Drop for ProgressHandle {
    fn drop(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

/// Start a stage on an optional reporter, a no-op handle when there is none.
#[must_use]
pub fn start(reporter: Option<&Arc<dyn ProgressReporter>>, stage: &str, message: &str) -> ProgressHandle {
    reporter.map_or_else(ProgressHandle::noop, |r| r.start(stage, message))
}

/// Spinner-based reporter for single-parser foreground use.
#[derive(Debug, Default, Clone)]
pub struct IndicatifProgress;

impl ProgressReporter for IndicatifProgress {
    fn start(&self, stage: &str, message: &str) -> ProgressHandle {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{prefix}] {msg}") {
            bar.set_style(style);
        }
        bar.set_prefix(stage.to_string());
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        ProgressHandle::from_bar(bar)
    }
}

/// A sink that buffers warnings in memory, used to print them per project
/// once all parsers have finished.
#[derive(Debug, Default, Clone)]
pub struct BufferedWarnings {
    messages: Arc<Mutex<Vec<String>>>,
}

impl BufferedWarnings {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A [`WarningSink`] appending to this buffer.
    #[must_use]
    pub fn sink(&self) -> WarningSink {
        let messages = Arc::clone(&self.messages);
        Arc::new(move |message: &str| {
            if let Ok(mut messages) = messages.lock() {
                messages.push(message.to_string());
            }
        })
    }

    /// Take the buffered warnings, leaving the buffer empty.
    #[must_use]
    pub fn take(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|mut messages| std::mem::take(&mut *messages))
            .unwrap_or_default()
    }
}
