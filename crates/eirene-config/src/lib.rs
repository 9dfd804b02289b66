//! The watched configuration file's model and parser.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod config;

pub use config::{parse_config, parse_process_data, read_config, ConfigError, ProcessConfig, ProcessItem};
