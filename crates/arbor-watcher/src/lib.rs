//! Arbor Watcher — live filesystem monitoring for the index

pub mod watcher;

pub use watcher::{DEFAULT_DEBOUNCE_MS, DELETE_SUFFIX, WatchService};
