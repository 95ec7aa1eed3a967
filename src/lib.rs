//! vidacquire - locate and download the primary video on a web page.
//!
//! A browser session is driven to the page while every network response is
//! observed; the largest qualifying media response is chosen (falling back to
//! the rendered `<video>` element) and streamed to disk under a name derived
//! from the page title.

pub mod browser;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod extract;
pub mod media;
pub mod services;
pub mod sink;

pub use config::Config;
pub use driver::{Acquisition, MediaSource, SessionDriver, SessionState};
pub use error::{AcquireError, Result};
pub use extract::extract_url;
