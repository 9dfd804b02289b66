//! File-watching backend for the configuration file `eirene-supervisor` watches.
//!
//! Emits raw, undebounced events; the supervisor coalesces bursts of
//! `Changed` into a single reconciliation pass.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod watcher;

pub use watcher::{NotifyWatcher, WatchError, WatchEvent, Watcher};
