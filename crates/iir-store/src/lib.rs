//! Disk side of the simulator: static table readers, TOML run configuration
//! and policy snapshots.

pub mod config;
pub mod error;
pub mod snapshot;
pub mod tables;

pub use config::{DataPaths, RunConfig, SimulationConfig};
pub use error::{Result, StoreError};
pub use snapshot::{load_policy, save_policy};
pub use tables::{load_corpus, load_dataset};
