//! Seams between the driver and a controllable browser.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::BrowserSettings;
use crate::error::AcquireError;
use crate::media::{MediaElementSnapshot, NetworkExchange};

/// Headers and window shape presented to the target site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_agent: String,
    /// Sent with navigation and with the media request.
    pub referer: Option<String>,
    pub viewport: (u32, u32),
}

impl Identity {
    /// Identity for visiting `page_url`. Without a configured referer the
    /// page's origin root is used.
    pub fn for_page(settings: &BrowserSettings, page_url: &str) -> Self {
        let referer = settings
            .referer
            .clone()
            .or_else(|| origin_root(page_url));
        Self {
            user_agent: settings.user_agent.clone(),
            referer,
            viewport: (settings.viewport_width, settings.viewport_height),
        }
    }
}

/// `https://host[:port]/` for an absolute URL.
pub fn origin_root(page_url: &str) -> Option<String> {
    let parsed = url::Url::parse(page_url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}/", parsed.scheme(), host, port),
        None => format!("{}://{}/", parsed.scheme(), host),
    })
}

/// How navigation ended. None of these is fatal; extraction proceeds on
/// whatever the page reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Loaded,
    TimedOut,
    Failed(String),
}

/// One live page in a controlled browser.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Stream of every response the page receives from now on.
    /// Exchanges started before this call are not observed.
    async fn exchanges(&self) -> Result<BoxStream<'static, NetworkExchange>, AcquireError>;

    /// Navigate, giving up waiting after `timeout`.
    async fn navigate(&self, url: &str, referer: Option<&str>, timeout: Duration)
        -> NavigationOutcome;

    /// Wait until `selector` matches, up to `timeout`. Returns whether it appeared.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> bool;

    /// Move the pointer around a little to wake lazy-loading players.
    async fn nudge_pointer(&self);

    async fn document_title(&self) -> Option<String>;

    /// Inner text of the first element matching `selector`.
    async fn text_of(&self, selector: &str) -> Option<String>;

    /// Attributes of the first element matching `selector`.
    async fn media_element(&self, selector: &str) -> Option<MediaElementSnapshot>;

    /// Release the page and its browser process.
    async fn close(&mut self);
}

/// Starts browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, identity: &Identity) -> Result<Box<dyn PageSession>, AcquireError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_root() {
        assert_eq!(
            origin_root("https://www.example.com/video/123?x=1").as_deref(),
            Some("https://www.example.com/")
        );
        assert_eq!(
            origin_root("http://127.0.0.1:8080/p").as_deref(),
            Some("http://127.0.0.1:8080/")
        );
        assert_eq!(origin_root("not a url"), None);
    }

    #[test]
    fn test_identity_prefers_configured_referer() {
        let mut settings = BrowserSettings::default();
        let identity = Identity::for_page(&settings, "https://v.example.com/abc");
        assert_eq!(identity.referer.as_deref(), Some("https://v.example.com/"));
        assert_eq!(identity.viewport, (1920, 1080));

        settings.referer = Some("https://www.example.com/".to_string());
        let identity = Identity::for_page(&settings, "https://v.example.com/abc");
        assert_eq!(identity.referer.as_deref(), Some("https://www.example.com/"));
    }
}
