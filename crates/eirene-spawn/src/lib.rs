#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod spawner;
mod throttle;

pub use spawner::{SpawnError, Spawner};
pub use throttle::OutputThrottle;
