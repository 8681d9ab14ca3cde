// src/config/mod.rs

//! Chain file configuration.
//!
//! - [`model`] holds the serde types for `Taskchain.toml`.
//! - [`loader`] reads and deserializes files.
//! - [`validate`] turns a `RawChainFile` into a checked `ChainFile`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str};
pub use model::{ChainFile, ChainSection, RawChainFile, StepConfig};
