//! Command-line interface for vidacquire.

mod commands;
pub mod progress;

pub use commands::{is_verbose, run};
pub use progress::progress_println;
