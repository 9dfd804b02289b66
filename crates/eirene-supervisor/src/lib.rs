//! Wires a file watcher to a manager pool and handles process shutdown
//! signals.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod signal;
mod supervisor;

pub use signal::wait_shutdown_signal;
pub use supervisor::{ConfigLoader, DataDeriver, Supervisor};
