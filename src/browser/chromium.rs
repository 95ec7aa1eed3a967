//! Chromium page sessions over CDP.
//!
//! Uses chromiumoxide with stealth evasion scripts registered before the
//! first navigation, so the target's bot checks see a regular desktop
//! browser.

#[cfg(feature = "browser")]
use std::time::{Duration, Instant};

use async_trait::async_trait;
#[cfg(feature = "browser")]
use futures::stream::BoxStream;
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::input::{DispatchMouseEventParams, DispatchMouseEventType};
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::{
    EventResponseReceived, Response, SetUserAgentOverrideParams,
};
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, NavigateParams,
};
#[cfg(feature = "browser")]
use chromiumoxide::handler::viewport::Viewport;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};

use super::session::{BrowserLauncher, Identity, PageSession};
use crate::config::BrowserSettings;
use crate::error::AcquireError;
#[cfg(feature = "browser")]
use super::binary::{find_chrome, INSTALL_HINT};
#[cfg(feature = "browser")]
use super::session::NavigationOutcome;
#[cfg(feature = "browser")]
use super::stealth::collect_scripts;
#[cfg(feature = "browser")]
use crate::media::dom::snapshot_script;
#[cfg(feature = "browser")]
use crate::media::exchange::{header_lookup, length_from_headers};
#[cfg(feature = "browser")]
use crate::media::{MediaElementSnapshot, NetworkExchange};

/// JavaScript to wait for page ready state.
#[cfg(feature = "browser")]
const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// How often `wait_for_selector` polls the DOM.
#[cfg(feature = "browser")]
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Launches headless (or headed) Chromium with the configured identity.
pub struct ChromiumLauncher {
    #[cfg_attr(not(feature = "browser"), allow(dead_code))]
    settings: BrowserSettings,
}

impl ChromiumLauncher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

#[cfg(feature = "browser")]
fn launch_error(context: &str, e: impl std::fmt::Display) -> AcquireError {
    AcquireError::Launch(format!("{}: {}", context, e))
}

#[cfg(feature = "browser")]
impl ChromiumLauncher {
    fn browser_config(&self, identity: &Identity) -> Result<BrowserConfig, AcquireError> {
        let chrome_path = find_chrome(self.settings.chrome_path.as_deref())
            .ok_or_else(|| AcquireError::Launch(INSTALL_HINT.to_string()))?;
        info!("Using browser at {}", chrome_path.display());

        let (width, height) = identity.viewport;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .viewport(Viewport {
                width,
                height,
                device_scale_factor: Some(1.0),
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            })
            .window_size(width, height);

        // Set headless mode (with_head means NOT headless, confusingly)
        if !self.settings.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = self.settings.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        // Add stealth-related Chrome args
        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--metrics-recording-only")
            .arg("--autoplay-policy=no-user-gesture-required")
            .arg("--mute-audio")
            .arg("--no-sandbox") // Often needed for headless in containers/restricted environments
            .arg("--disable-gpu");

        for arg in &self.settings.chrome_args {
            builder = builder.arg(arg);
        }

        builder
            .build()
            .map_err(|e| launch_error("Failed to build browser config", e))
    }

    async fn open_page(
        browser: &Browser,
        identity: &Identity,
        scripts: &[String],
    ) -> Result<Page, AcquireError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| launch_error("Failed to open page", e))?;

        // Set realistic user agent first (before any navigation)
        page.execute(SetUserAgentOverrideParams::new(identity.user_agent.clone()))
            .await
            .map_err(|e| launch_error("Failed to set user agent", e))?;

        debug!("Registering {} stealth scripts", scripts.len());
        for script in scripts {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(script.clone()))
                .await
                .map_err(|e| launch_error("Failed to inject anti-detection script", e))?;
        }

        Ok(page)
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, identity: &Identity) -> Result<Box<dyn PageSession>, AcquireError> {
        let scripts = collect_scripts(
            self.settings.stealth_script.as_deref(),
            self.settings.stealth_required,
        )?;
        let config = self.browser_config(identity)?;

        info!("Launching browser (headless={})", self.settings.headless);
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| launch_error("Failed to launch browser", e))?;

        // Spawn handler task
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        match Self::open_page(&browser, identity, &scripts).await {
            Ok(page) => Ok(Box::new(ChromiumSession {
                browser: Some(browser),
                page,
                handler_task: Some(handler_task),
                viewport: identity.viewport,
            })),
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                Err(e)
            }
        }
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, _identity: &Identity) -> Result<Box<dyn PageSession>, AcquireError> {
        Err(AcquireError::Launch(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
                .to_string(),
        ))
    }
}

/// One Chromium process with one page.
#[cfg(feature = "browser")]
pub struct ChromiumSession {
    browser: Option<Browser>,
    page: Page,
    handler_task: Option<JoinHandle<()>>,
    viewport: (u32, u32),
}

#[cfg(feature = "browser")]
fn exchange_from_response(response: &Response) -> NetworkExchange {
    let headers = response.headers.inner();
    let content_type = header_lookup(headers, "content-type")
        .map(str::to_string)
        .unwrap_or_else(|| response.mime_type.clone());

    NetworkExchange {
        url: response.url.clone(),
        status: u16::try_from(response.status).unwrap_or(0),
        content_type,
        declared_length: length_from_headers(
            header_lookup(headers, "content-length"),
            header_lookup(headers, "content-range"),
        ),
    }
}

#[cfg(feature = "browser")]
impl ChromiumSession {
    /// Wait for the page to reach a ready state.
    async fn wait_for_page_ready(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.page.evaluate(WAIT_FOR_READY_SCRIPT)).await {
            Ok(Ok(result)) => {
                let state: String = result
                    .into_value()
                    .unwrap_or_else(|_| "unknown".to_string());
                debug!("Page ready state: {}", state);
                true
            }
            Ok(Err(e)) => {
                debug!("Could not check ready state: {}", e);
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageSession for ChromiumSession {
    async fn exchanges(&self) -> Result<BoxStream<'static, NetworkExchange>, AcquireError> {
        let events = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| launch_error("Failed to subscribe to network events", e))?;

        Ok(events
            .map(|event| exchange_from_response(&event.response))
            .boxed())
    }

    async fn navigate(
        &self,
        url: &str,
        referer: Option<&str>,
        timeout: Duration,
    ) -> NavigationOutcome {
        info!("Navigating to {}", url);
        let mut params = NavigateParams::builder().url(url);
        if let Some(referer) = referer {
            params = params.referrer(referer);
        }
        let params = match params.build() {
            Ok(p) => p,
            Err(e) => return NavigationOutcome::Failed(format!("Invalid URL: {}", e)),
        };

        let started = Instant::now();
        match tokio::time::timeout(timeout, self.page.execute(params)).await {
            Err(_) => return NavigationOutcome::TimedOut,
            Ok(Err(e)) => return NavigationOutcome::Failed(e.to_string()),
            Ok(Ok(response)) => {
                if let Some(error) = response.result.error_text.clone() {
                    return NavigationOutcome::Failed(error);
                }
            }
        }

        let remaining = timeout.saturating_sub(started.elapsed());
        if self.wait_for_page_ready(remaining).await {
            NavigationOutcome::Loaded
        } else {
            NavigationOutcome::TimedOut
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> bool {
        debug!("Waiting for selector: {}", selector);
        let deadline = Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn nudge_pointer(&self) {
        let (width, height) = self.viewport;
        let (cx, cy) = (f64::from(width) / 2.0, f64::from(height) / 2.0);
        let path = [(cx, cy), (cx + 37.0, cy + 21.0), (cx - 52.0, cy + 8.0), (cx, cy)];

        for (x, y) in path {
            let params = DispatchMouseEventParams::new(DispatchMouseEventType::MouseMoved, x, y);
            if let Err(e) = self.page.execute(params).await {
                debug!("Pointer nudge skipped: {}", e);
                return;
            }
            tokio::time::sleep(Duration::from_millis(80)).await;
        }
    }

    async fn document_title(&self) -> Option<String> {
        match self.page.get_title().await {
            Ok(title) => title,
            Err(e) => {
                warn!("Could not read document title: {}", e);
                None
            }
        }
    }

    async fn text_of(&self, selector: &str) -> Option<String> {
        let literal = serde_json::to_string(selector).ok()?;
        let script = format!(
            "(() => {{ const el = document.querySelector({}); return el ? (el.innerText || el.textContent || '') : null; }})()",
            literal
        );
        self.page
            .evaluate(script)
            .await
            .ok()?
            .into_value::<Option<String>>()
            .ok()
            .flatten()
    }

    async fn media_element(&self, selector: &str) -> Option<MediaElementSnapshot> {
        match self.page.evaluate(snapshot_script(selector)).await {
            // A missing element evaluates to null, which carries no value
            Ok(result) => result
                .into_value::<Option<MediaElementSnapshot>>()
                .ok()
                .flatten(),
            Err(e) => {
                warn!("Media element inspection failed: {}", e);
                None
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.page.clone().close().await {
            debug!("Page close failed: {}", e);
        }
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Browser close failed: {}", e);
            }
            let _ = browser.wait().await;
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        info!("Browser closed");
    }
}

#[cfg(feature = "browser")]
impl Drop for ChromiumSession {
    fn drop(&mut self) {
        // Browser's own Drop kills the child process; stop pumping events.
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
    }
}
