//! Configuration management
//!
//! Node address, difficulty prefix and mining reward. Values come from
//! built-in defaults, then an optional TOML file, then `FASTCHAIN_*`
//! environment variables.

pub mod settings;

pub use settings::{Config, GLOBAL_CONFIG};
