//! Browser session management.
//!
//! The driver only sees [`PageSession`] and [`BrowserLauncher`]; the
//! Chromium implementation lives behind the `browser` feature.

pub mod binary;
mod chromium;
pub mod session;
pub mod stealth;

pub use binary::{find_chrome, resolve_browser_runtime};
pub use chromium::ChromiumLauncher;
pub use session::{BrowserLauncher, Identity, NavigationOutcome, PageSession};
