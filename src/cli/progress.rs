//! Progress display for a media transfer.
//!
//! Also provides global progress context for coordinating output from
//! any part of the application during progress display.

use std::sync::{OnceLock, RwLock};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::services::DownloadEvent;

/// Global reference to active progress display for coordinating output.
static ACTIVE_PROGRESS: OnceLock<RwLock<Option<MultiProgress>>> = OnceLock::new();

fn get_active_progress() -> &'static RwLock<Option<MultiProgress>> {
    ACTIVE_PROGRESS.get_or_init(|| RwLock::new(None))
}

/// Set the global active progress display.
pub fn set_active_progress(multi: Option<MultiProgress>) {
    if let Ok(mut guard) = get_active_progress().write() {
        *guard = multi;
    }
}

/// Print a message that coordinates with any active progress display.
/// Falls back to println! if no progress display is active.
pub fn progress_println(message: &str) {
    if let Ok(guard) = get_active_progress().read() {
        if let Some(ref multi) = *guard {
            let _ = multi.println(message);
            return;
        }
    }
    println!("{}", message);
}

/// One bar for one transfer: bytes when the length is known, a spinner otherwise.
pub struct TransferProgress {
    multi: MultiProgress,
    bar: Option<ProgressBar>,
    label: String,
}

impl TransferProgress {
    pub fn new(label: &str) -> Self {
        Self {
            multi: MultiProgress::new(),
            bar: None,
            label: truncate_filename(label, 40),
        }
    }

    pub fn handle(&mut self, event: &DownloadEvent) {
        match event {
            DownloadEvent::Started { total, .. } => {
                let bar = self.multi.add(ProgressBar::new(total.unwrap_or(0)));
                if total.is_some() {
                    bar.set_style(
                        ProgressStyle::default_bar()
                            .template(
                                "  {spinner:.cyan} {wide_msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})",
                            )
                            .unwrap()
                            .progress_chars("━╸─"),
                    );
                } else {
                    // Unknown size - use spinner style
                    bar.set_style(
                        ProgressStyle::default_spinner()
                            .template("  {spinner:.cyan} {wide_msg} {bytes}")
                            .unwrap(),
                    );
                }
                bar.set_message(self.label.clone());
                bar.enable_steady_tick(Duration::from_millis(100));
                self.bar = Some(bar);

                // Register as active progress display for coordinated output.
                // A hidden display would swallow printed lines.
                if !self.multi.is_hidden() {
                    set_active_progress(Some(self.multi.clone()));
                }
            }
            DownloadEvent::Progress { bytes, .. } => {
                if let Some(ref bar) = self.bar {
                    bar.set_position(*bytes);
                }
            }
            DownloadEvent::Completed { bytes } => {
                if let Some(ref bar) = self.bar {
                    bar.set_position(*bytes);
                    bar.finish_and_clear();
                }
            }
            DownloadEvent::Failed { .. } => {
                if let Some(ref bar) = self.bar {
                    bar.abandon();
                }
            }
        }
    }

    /// Clear the display and unregister it.
    pub fn finish(self) {
        if let Some(bar) = self.bar {
            if !bar.is_finished() {
                bar.finish_and_clear();
            }
        }
        set_active_progress(None);
    }
}

/// Render events until the sending side closes.
pub fn spawn_renderer(label: &str) -> (mpsc::Sender<DownloadEvent>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<DownloadEvent>(256);
    let mut progress = TransferProgress::new(label);
    let task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            progress.handle(&event);
        }
        progress.finish();
    });
    (tx, task)
}

/// Truncate a label for display, keeping any extension visible.
fn truncate_filename(name: &str, max_len: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max_len {
        return name.to_string();
    }

    // Try to keep the extension
    if let Some(dot_pos) = chars.iter().rposition(|&c| c == '.') {
        let ext: String = chars[dot_pos..].iter().collect();
        let ext_len = chars.len() - dot_pos;
        if ext_len + 4 < max_len {
            let prefix: String = chars[..max_len - ext_len - 3].iter().collect();
            return format!("{}...{}", prefix, ext);
        }
    }

    // Just truncate
    let prefix: String = chars[..max_len - 3].iter().collect();
    format!("{}...", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_filename() {
        assert_eq!(truncate_filename("short.mp4", 20), "short.mp4");
        assert_eq!(
            truncate_filename("a_very_long_filename_that_needs_truncation.mp4", 25),
            "a_very_long_filena....mp4"
        );
        assert_eq!(truncate_filename("no_extension", 8), "no_ex...");
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let name = "超长的视频标题超长的视频标题.mp4";
        let truncated = truncate_filename(name, 10);
        assert_eq!(truncated.chars().count(), 10);
        assert!(truncated.ends_with(".mp4"));
    }
}
