//! Failure taxonomy for a single acquisition run.
//!
//! Every variant is local to one run. None of them should take down the
//! hosting process; the prompt loop decides whether to ask again.

use thiserror::Error;

/// Reasons a run can end without a file on disk.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// No absolute http(s) URL in the pasted text.
    #[error("no http/https link found in input")]
    Extraction,

    /// Browser process could not be started or configured.
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// Navigation exceeded its budget. Logged, then extraction continues.
    #[error("navigation to {url} timed out after {secs}s")]
    NavigationTimeout { url: String, secs: u64 },

    /// Neither network observation nor the DOM produced a usable URL.
    #[error(
        "no media stream found on page. Likely causes:\n\
         1. the video requires a logged-in session\n\
         2. a verification challenge or rate limit was served\n\
         3. the network was too slow for the media to start loading"
    )]
    NoCandidateFound,

    /// The only reference is an in-memory stream that cannot be fetched on its own.
    #[error("media is only exposed as an in-memory stream ({reference}), which is not supported")]
    UnsupportedMediaEncoding { reference: String },

    /// Non-200 response or I/O failure while streaming to disk.
    #[error("download failed: {0}")]
    DownloadFailure(String),

    /// The cancel flag was raised while the browser was still working.
    #[error("run cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AcquireError {
    /// Short machine-friendly label, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AcquireError::Extraction => "extraction_failure",
            AcquireError::Launch(_) => "launch_error",
            AcquireError::NavigationTimeout { .. } => "navigation_timeout",
            AcquireError::NoCandidateFound => "no_candidate_found",
            AcquireError::UnsupportedMediaEncoding { .. } => "unsupported_media_encoding",
            AcquireError::DownloadFailure(_) => "download_failure",
            AcquireError::Cancelled => "cancelled",
            AcquireError::Config(_) => "config_error",
            AcquireError::Io(_) => "io_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, AcquireError>;
