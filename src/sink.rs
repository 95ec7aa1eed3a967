//! Human-readable progress lines for whoever is driving a run.
//!
//! A front end (REPL, GUI log pane) injects a callback; without one the
//! lines go through the shared progress display so they never tear an
//! active progress bar.

use std::fmt;
use std::sync::Arc;

use crate::cli::progress::progress_println;

/// Callback receiving one rendered line at a time.
pub type LogCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Cloneable handle to the presentation sink.
#[derive(Clone, Default)]
pub struct Reporter {
    callback: Option<LogCallback>,
}

impl Reporter {
    /// Reporter that forwards to `callback`.
    pub fn new(callback: LogCallback) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    /// Reporter that prints through the default sink.
    pub fn stdout() -> Self {
        Self::default()
    }

    /// Emit one line.
    pub fn line(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::debug!(target: "vidacquire::sink", "{}", message);
        match self.callback {
            Some(ref cb) => cb(message),
            None => progress_println(message),
        }
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("custom", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use super::Reporter;

    /// Reporter that records every line, for assertions.
    pub fn capturing() -> (Reporter, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let reporter = Reporter::new(Arc::new(move |line: &str| {
            sink.lock().unwrap().push(line.to_string());
        }));
        (reporter, lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_receives_lines() {
        let (reporter, lines) = testing::capturing();
        reporter.line("one");
        reporter.line(String::from("two"));
        assert_eq!(*lines.lock().unwrap(), vec!["one", "two"]);
    }
}
