//! One acquisition run: launch, observe, navigate, resolve, download.
//!
//! ```text
//! Idle -> Launching -> NavigatingPage -> AwaitingMedia -> Resolving -> Downloading -> Closed
//!                                   any step -> Failed
//! ```
//!
//! The browser session is always closed before the run returns, whichever
//! step failed.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::browser::{BrowserLauncher, Identity, NavigationOutcome, PageSession};
use crate::config::Config;
use crate::error::AcquireError;
use crate::extract::extract_url;
use crate::media::{
    resolve_from_element, resolve_title, select_primary, spawn_observer, MediaFilter,
    TitleSources,
};
use crate::services::download::{cancelled, DownloadEvent, DownloadTarget, MediaDownloader};
use crate::sink::Reporter;

/// File extension given to every download.
pub const MEDIA_EXTENSION: &str = "mp4";

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Launching,
    NavigatingPage,
    AwaitingMedia,
    Resolving,
    Downloading,
    Closed,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Launching => "launching",
            SessionState::NavigatingPage => "navigating",
            SessionState::AwaitingMedia => "awaiting media",
            SessionState::Resolving => "resolving",
            SessionState::Downloading => "downloading",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Where the chosen URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSource {
    /// Largest qualifying network response.
    Network,
    /// The rendered media element.
    Dom,
}

/// A completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquisition {
    pub page_url: String,
    pub title: String,
    pub target: DownloadTarget,
    pub source: MediaSource,
    pub bytes_written: u64,
}

/// Result of the in-browser part of a run.
struct Located {
    title: String,
    source_url: String,
    source: MediaSource,
}

/// Drives one browser session per run.
pub struct SessionDriver {
    config: Config,
    launcher: Arc<dyn BrowserLauncher>,
    reporter: Reporter,
    progress: Option<mpsc::Sender<DownloadEvent>>,
    cancel: watch::Receiver<bool>,
    state: SessionState,
    history: Vec<SessionState>,
}

impl SessionDriver {
    pub fn new(config: Config, launcher: Arc<dyn BrowserLauncher>) -> Self {
        // Dropping the sender means this receiver never signals
        let (_, cancel) = watch::channel(false);
        Self {
            config,
            launcher,
            reporter: Reporter::stdout(),
            progress: None,
            cancel,
            state: SessionState::Idle,
            history: vec![SessionState::Idle],
        }
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Raising the flag aborts the page work or an in-flight download.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Progress channel for the next download only. The sender is consumed by
    /// that download, so the receiving end sees the channel close when it ends.
    pub fn set_progress(&mut self, tx: mpsc::Sender<DownloadEvent>) {
        self.progress = Some(tx);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// States visited by the most recent run, in order.
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    fn transition(&mut self, next: SessionState) {
        info!("Session {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    /// Extract the page link from free text, then run.
    pub async fn acquire(&mut self, raw_text: &str) -> Result<Acquisition, AcquireError> {
        match extract_url(raw_text) {
            Some(url) => {
                self.reporter.line(format!("Found link: {}", url));
                self.run(&url).await
            }
            None => {
                let e = AcquireError::Extraction;
                self.reporter.line(format!("Error: {}", e));
                Err(e)
            }
        }
    }

    /// Run the full pipeline against one page URL.
    pub async fn run(&mut self, page_url: &str) -> Result<Acquisition, AcquireError> {
        self.state = SessionState::Idle;
        self.history = vec![SessionState::Idle];

        let result = self.run_inner(page_url).await;
        // Close the progress channel even if no download started
        self.progress = None;
        match result {
            Ok(acquisition) => {
                self.transition(SessionState::Closed);
                Ok(acquisition)
            }
            Err(e) => {
                self.transition(SessionState::Failed);
                self.report_failure(&e);
                Err(e)
            }
        }
    }

    async fn run_inner(&mut self, page_url: &str) -> Result<Acquisition, AcquireError> {
        let identity = Identity::for_page(&self.config.browser, page_url);

        self.transition(SessionState::Launching);
        self.reporter.line(format!(
            "Starting browser ({})",
            if self.config.browser.headless {
                "headless"
            } else {
                "headed"
            }
        ));
        let mut session = self.launcher.launch(&identity).await?;

        // Inner call so the session is always closed, even on error or cancel
        let mut cancel = self.cancel.clone();
        let located = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => Err(AcquireError::Cancelled),
            located = self.locate(session.as_ref(), page_url, &identity) => located,
        };
        session.close().await;
        self.reporter.line("Browser closed");
        let located = located?;

        let save_dir = self.config.save_dir();
        self.ensure_save_dir(&save_dir).await?;
        let target = DownloadTarget {
            source_url: located.source_url,
            destination_path: save_dir.join(format!("{}.{}", located.title, MEDIA_EXTENSION)),
        };

        self.transition(SessionState::Downloading);
        self.reporter.line(format!(
            "Downloading to {}",
            target.destination_path.display()
        ));
        let downloader = MediaDownloader::new(
            &identity,
            &self.config.download,
            self.config.browser.proxy.as_deref(),
        )?;
        let bytes_written = downloader
            .download(&target, self.progress.take(), self.cancel.clone())
            .await
            .into_result()?;
        self.reporter.line(format!(
            "Saved {} ({})",
            target.destination_path.display(),
            format_bytes(bytes_written)
        ));

        Ok(Acquisition {
            page_url: page_url.to_string(),
            title: located.title,
            target,
            source: located.source,
            bytes_written,
        })
    }

    /// Everything that needs the live page.
    async fn locate(
        &mut self,
        session: &dyn PageSession,
        page_url: &str,
        identity: &Identity,
    ) -> Result<Located, AcquireError> {
        let detection = self.config.detection.clone();

        // Observer must be attached before navigation starts
        let exchanges = session.exchanges().await?;
        let observer = spawn_observer(exchanges, MediaFilter::new(&detection));

        self.transition(SessionState::NavigatingPage);
        self.reporter.line(format!("Opening {}", page_url));
        match session
            .navigate(
                page_url,
                identity.referer.as_deref(),
                detection.navigation_timeout(),
            )
            .await
        {
            NavigationOutcome::Loaded => {}
            NavigationOutcome::TimedOut => {
                let e = AcquireError::NavigationTimeout {
                    url: page_url.to_string(),
                    secs: detection.navigation_timeout_secs,
                };
                warn!("{}", e);
                self.reporter
                    .line("Page load timed out, continuing with what has loaded");
            }
            NavigationOutcome::Failed(reason) => {
                warn!("Navigation to {} failed: {}", page_url, reason);
                self.reporter.line(format!(
                    "Navigation reported an error ({}), continuing anyway",
                    reason
                ));
            }
        }

        self.transition(SessionState::AwaitingMedia);
        self.reporter.line("Waiting for the player to load...");
        if session
            .wait_for_selector(&detection.media_selector, detection.media_wait_timeout())
            .await
        {
            tokio::time::sleep(detection.settle_delay()).await;
            if detection.nudge_pointer {
                session.nudge_pointer().await;
            }
        } else {
            warn!(
                "No '{}' element within {}s",
                detection.media_selector, detection.media_wait_timeout_secs
            );
            self.reporter
                .line("Player element did not appear, checking captured traffic");
        }

        self.transition(SessionState::Resolving);
        let title = self.page_title(session).await;
        self.reporter.line(format!("Title: {}", title));

        let candidates = observer.close().await;
        info!("Observed {} media candidates", candidates.len());

        if let Some(primary) = select_primary(&candidates) {
            self.reporter.line(format!(
                "Captured media stream ({})",
                format_bytes(primary.size_bytes)
            ));
            return Ok(Located {
                title,
                source_url: primary.url.clone(),
                source: MediaSource::Network,
            });
        }

        self.reporter
            .line("No stream captured from traffic, inspecting the page");
        let snapshot = session
            .media_element(&detection.media_selector)
            .await
            .ok_or(AcquireError::NoCandidateFound)?;
        let source_url = resolve_from_element(&snapshot)?.ok_or(AcquireError::NoCandidateFound)?;
        self.reporter.line("Found media address on the page");

        Ok(Located {
            title,
            source_url,
            source: MediaSource::Dom,
        })
    }

    async fn page_title(&self, session: &dyn PageSession) -> String {
        let document_title = session.document_title().await;

        let mut heading = None;
        for selector in &self.config.detection.title_selectors {
            if let Some(text) = session.text_of(selector).await {
                if !crate::media::sanitize(&text).is_empty() {
                    heading = Some(text);
                    break;
                }
            }
        }

        let sources = TitleSources {
            document_title,
            heading,
        };
        resolve_title(
            &sources,
            &self.config.detection,
            chrono::Utc::now().timestamp(),
        )
    }

    async fn ensure_save_dir(&self, dir: &Path) -> Result<(), AcquireError> {
        if tokio::fs::metadata(dir).await.is_ok_and(|m| m.is_dir()) {
            return Ok(());
        }
        tokio::fs::create_dir_all(dir).await?;
        self.reporter
            .line(format!("Created save directory {}", dir.display()));
        Ok(())
    }

    fn report_failure(&self, error: &AcquireError) {
        warn!(kind = error.kind(), "Run failed: {}", error);
        self.reporter.line(format!("Error: {}", error));
        if matches!(error, AcquireError::NoCandidateFound) && self.config.browser.headless {
            self.reporter
                .line("Try again with a visible browser (--headed) to see what the page shows.");
        }
    }
}

/// Human-readable byte count.
pub fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;

    let b = bytes as f64;
    if b >= GIB {
        format!("{:.2} GiB", b / GIB)
    } else if b >= MIB {
        format!("{:.2} MiB", b / MIB)
    } else if b >= KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{} B", bytes)
    }
}
