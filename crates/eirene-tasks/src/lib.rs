//! The Task Template / Active Task Record / Task Manager core: owns at most
//! one in-flight task per slot, serializes updates against it, runs the
//! retry-with-backoff loop, and performs teardown.
//!
//! Reconciling many slots against an incoming data vector is
//! [`eirene_pool`]'s job; this crate only knows about a single slot.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod active;
mod context;
mod error;
mod manager;
mod retry;
mod template;

pub use context::{LaunchContext, TaskLog, TeardownContext};
pub use error::{LaunchError, TemplateError};
pub use manager::TaskManager;
pub use template::{LaunchFn, RetryPolicy, TaskTemplate, TaskTemplateBuilder, TeardownFn};
