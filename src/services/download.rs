//! Streaming media download.
//!
//! Fetches one resolved media URL with the browsing session's identity
//! headers and writes it to disk chunk by chunk. Separated from UI
//! concerns - emits events for progress tracking.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use reqwest::{Client, StatusCode};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::browser::Identity;
use crate::config::DownloadSettings;
use crate::error::AcquireError;

/// Failure reason reported for a transfer stopped through the cancel signal.
pub const CANCELLED: &str = "cancelled";

/// The single unit of work handed to the downloader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub source_url: String,
    pub destination_path: PathBuf,
}

/// Events emitted during a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    /// Response accepted, body about to stream.
    Started { url: String, total: Option<u64> },
    /// Bytes written so far against the declared length.
    Progress { bytes: u64, total: u64 },
    /// File is in place.
    Completed { bytes: u64 },
    Failed { error: String },
}

impl DownloadEvent {
    /// Completion ratio for `Progress` events.
    pub fn fraction(&self) -> Option<f64> {
        match *self {
            DownloadEvent::Progress { bytes, total } if total > 0 => {
                Some(bytes as f64 / total as f64)
            }
            _ => None,
        }
    }
}

/// Result of a transfer. Failures are data, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub bytes_written: u64,
    pub success: bool,
    pub failure_reason: Option<String>,
}

impl DownloadOutcome {
    fn completed(bytes_written: u64) -> Self {
        Self {
            bytes_written,
            success: true,
            failure_reason: None,
        }
    }

    fn failed(bytes_written: u64, reason: impl Into<String>) -> Self {
        Self {
            bytes_written,
            success: false,
            failure_reason: Some(reason.into()),
        }
    }

    /// Convert to the run-level error taxonomy.
    pub fn into_result(self) -> Result<u64, AcquireError> {
        if self.success {
            Ok(self.bytes_written)
        } else {
            Err(AcquireError::DownloadFailure(
                self.failure_reason
                    .unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }
}

/// Sibling path the body is streamed into before the final rename.
pub fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

/// HTTP downloader carrying a fixed identity.
pub struct MediaDownloader {
    client: Client,
    chunk_size: usize,
}

impl MediaDownloader {
    /// Build a client that presents the same headers as the browser session.
    pub fn new(
        identity: &Identity,
        settings: &DownloadSettings,
        proxy: Option<&str>,
    ) -> Result<Self, AcquireError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&identity.user_agent)
                .map_err(|e| AcquireError::Config(format!("invalid user agent: {}", e)))?,
        );
        if let Some(ref referer) = identity.referer {
            headers.insert(
                REFERER,
                HeaderValue::from_str(referer)
                    .map_err(|e| AcquireError::Config(format!("invalid referer: {}", e)))?,
            );
        }

        let mut builder = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs));
        if let Some(proxy) = proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| AcquireError::Config(format!("invalid proxy {}: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| AcquireError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            chunk_size: settings.chunk_size.max(1),
        })
    }

    /// Stream `target` to disk.
    ///
    /// The body goes to `<dest>.part` and is renamed into place only after a
    /// complete, flushed transfer. On any failure the partial file is removed.
    pub async fn download(
        &self,
        target: &DownloadTarget,
        events: Option<mpsc::Sender<DownloadEvent>>,
        cancel: watch::Receiver<bool>,
    ) -> DownloadOutcome {
        let temp_path = part_path(&target.destination_path);
        let mut written = 0u64;

        let result = self
            .transfer(target, &temp_path, events.as_ref(), cancel, &mut written)
            .await;

        let outcome = match result {
            Ok(()) => match tokio::fs::rename(&temp_path, &target.destination_path).await {
                Ok(()) => DownloadOutcome::completed(written),
                Err(e) => DownloadOutcome::failed(written, format!("failed to finalize file: {}", e)),
            },
            Err(reason) => DownloadOutcome::failed(written, reason),
        };

        if outcome.success {
            info!(
                "Downloaded {} bytes to {}",
                written,
                target.destination_path.display()
            );
            emit(events.as_ref(), DownloadEvent::Completed { bytes: written }).await;
        } else {
            if let Err(e) = tokio::fs::remove_file(&temp_path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Could not remove partial file {}: {}", temp_path.display(), e);
                }
            }
            let error = outcome.failure_reason.clone().unwrap_or_default();
            warn!("Download of {} failed: {}", target.source_url, error);
            emit(events.as_ref(), DownloadEvent::Failed { error }).await;
        }

        outcome
    }

    async fn transfer(
        &self,
        target: &DownloadTarget,
        temp_path: &Path,
        events: Option<&mpsc::Sender<DownloadEvent>>,
        mut cancel: watch::Receiver<bool>,
        written: &mut u64,
    ) -> Result<(), String> {
        debug!("GET {}", target.source_url);
        let response = self
            .client
            .get(&target.source_url)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(format!("HTTP {}", status));
        }

        let total = response.content_length().filter(|&n| n > 0);
        emit(
            events,
            DownloadEvent::Started {
                url: target.source_url.clone(),
                total,
            },
        )
        .await;

        let file = File::create(temp_path)
            .await
            .map_err(|e| format!("failed to create {}: {}", temp_path.display(), e))?;
        let mut writer = BufWriter::with_capacity(self.chunk_size, file);
        let mut stream = response.bytes_stream();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => return Err(CANCELLED.to_string()),
                next = stream.next() => next,
            };

            let bytes = match next {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => return Err(format!("stream interrupted: {}", e)),
                None => break,
            };

            for chunk in bytes.chunks(self.chunk_size) {
                writer
                    .write_all(chunk)
                    .await
                    .map_err(|e| format!("write failed: {}", e))?;
                *written += chunk.len() as u64;

                if let Some(total) = total {
                    emit(
                        events,
                        DownloadEvent::Progress {
                            bytes: *written,
                            total,
                        },
                    )
                    .await;
                }
            }
        }

        writer
            .flush()
            .await
            .map_err(|e| format!("flush failed: {}", e))?;

        if let Some(total) = total {
            if *written < total {
                return Err(format!("truncated body: {} of {} bytes", written, total));
            }
        }

        Ok(())
    }
}

async fn emit(events: Option<&mpsc::Sender<DownloadEvent>>, event: DownloadEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}

/// Resolves once the cancel flag is raised. A dropped sender never cancels.
pub(crate) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let sender_gone = cancel.wait_for(|&c| c).await.is_err();
    if sender_gone {
        std::future::pending::<()>().await;
    }
}
