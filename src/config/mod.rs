//! Configuration model for smcore.
//!
//! This module defines the Config struct that represents the YAML config file.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! sensible defaults for every field, and validation of config values.

mod model;
mod operations;
pub mod types;


pub use model::Config;
pub use operations::{CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH};
