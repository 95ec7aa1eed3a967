//! Service layer for vidacquire.
//!
//! Domain logic separated from UI concerns, usable from the CLI or any
//! other front end.

pub mod download;

pub use download::{
    DownloadEvent, DownloadOutcome, DownloadTarget, MediaDownloader, CANCELLED,
};
