//! Media location: classify exchanges, rank candidates, fall back to the DOM,
//! and name the result.

pub mod dom;
pub mod exchange;
pub mod observer;
pub mod ranker;
pub mod title;

pub use dom::{resolve_from_element, MediaElementSnapshot};
pub use exchange::{MediaCandidate, NetworkExchange};
pub use observer::{spawn_observer, MediaFilter, ObserverHandle};
pub use ranker::select_primary;
pub use title::{resolve_title, sanitize, TitleSources};
