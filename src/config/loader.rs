// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ChainFile, RawChainFile};
use crate::errors::Result;

/// Load a chain file from a given path and return the raw `RawChainFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawChainFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    parse_str(&contents)
}

/// Deserialize a chain file from TOML text.
pub fn parse_str(contents: &str) -> Result<RawChainFile> {
    let raw: RawChainFile = toml::from_str(contents)?;
    Ok(raw)
}

/// Load a chain file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks step names and timing values.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ChainFile> {
    let raw = load_from_path(&path)?;
    let chain = ChainFile::try_from(raw)?;
    Ok(chain)
}

/// Default chain file location: `Taskchain.toml` in the current working
/// directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Taskchain.toml")
}
