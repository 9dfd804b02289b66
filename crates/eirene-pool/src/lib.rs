//! The Manager Pool: reconciles an index-keyed map of [`eirene_tasks::TaskManager`]s
//! against an incoming `(config, data[])` pair, and drives orderly teardown.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod pool;

pub use pool::ManagerPool;
