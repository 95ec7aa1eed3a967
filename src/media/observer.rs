//! Classify every exchange a page produces and keep the media candidates.
//!
//! The observer is a single spawned task that owns the candidate list. The
//! driver never touches the list while the page is live; it closes the
//! observation window and receives the finished list back.

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

use super::exchange::{MediaCandidate, NetworkExchange};
use crate::config::DetectionSettings;

/// Why an exchange was not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Status(u16),
    NotMedia,
    UnknownLength,
    TooSmall(u64),
}

/// Filter policy applied to each exchange, in order: status, media marker, size gate.
#[derive(Debug, Clone)]
pub struct MediaFilter {
    content_types: Vec<String>,
    extensions: Vec<String>,
    min_bytes: u64,
}

impl MediaFilter {
    pub fn new(settings: &DetectionSettings) -> Self {
        Self {
            content_types: settings
                .media_content_types
                .iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
            extensions: settings
                .media_extensions
                .iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
            min_bytes: settings.min_candidate_bytes,
        }
    }

    /// Decide whether `exchange` is a candidate.
    pub fn classify(&self, exchange: &NetworkExchange) -> Result<MediaCandidate, Rejection> {
        if exchange.status != 200 {
            return Err(Rejection::Status(exchange.status));
        }

        let content_type = exchange.content_type.to_ascii_lowercase();
        let by_type = self.content_types.iter().any(|t| content_type.contains(t));
        let by_ext = || {
            let path = exchange.path_lower();
            self.extensions.iter().any(|e| path.ends_with(e))
        };
        if !by_type && !by_ext() {
            return Err(Rejection::NotMedia);
        }

        let size = exchange.declared_length.ok_or(Rejection::UnknownLength)?;
        if size < self.min_bytes {
            return Err(Rejection::TooSmall(size));
        }

        Ok(MediaCandidate {
            url: exchange.url.clone(),
            size_bytes: size,
        })
    }
}

/// Handle to a running observer task.
pub struct ObserverHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Vec<MediaCandidate>>,
}

/// Start observing `exchanges`. Must be called before navigation begins.
pub fn spawn_observer(
    mut exchanges: BoxStream<'static, NetworkExchange>,
    filter: MediaFilter,
) -> ObserverHandle {
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let mut candidates = Vec::new();
        loop {
            tokio::select! {
                // Drain whatever is already queued before honoring the stop signal
                biased;
                next = exchanges.next() => match next {
                    Some(exchange) => match filter.classify(&exchange) {
                        Ok(candidate) => {
                            debug!(
                                "Media candidate: {} ({} bytes)",
                                candidate.url, candidate.size_bytes
                            );
                            candidates.push(candidate);
                        }
                        Err(reason) => {
                            debug!("Skipping exchange {}: {:?}", exchange.url, reason);
                        }
                    },
                    None => break,
                },
                _ = &mut stop_rx => break,
            }
        }
        candidates
    });

    ObserverHandle {
        stop: Some(stop_tx),
        task,
    }
}

impl ObserverHandle {
    /// Close the observation window and take the collected candidates.
    pub async fn close(mut self) -> Vec<MediaCandidate> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match self.task.await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!("Response observer ended abnormally: {}", e);
                Vec::new()
            }
        }
    }
}
