// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{ChainFile, RawChainFile};
use crate::errors::{ChainError, Result};

impl TryFrom<RawChainFile> for ChainFile {
    type Error = crate::errors::ChainError;

    fn try_from(raw: RawChainFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_chain(&raw)?;
        Ok(ChainFile::new_unchecked(raw.chain, raw.steps))
    }
}

fn validate_raw_chain(cfg: &RawChainFile) -> Result<()> {
    ensure_has_steps(cfg)?;
    validate_chain_section(cfg)?;
    validate_step_names(cfg)?;
    validate_step_timing(cfg)?;
    Ok(())
}

fn ensure_has_steps(cfg: &RawChainFile) -> Result<()> {
    if cfg.steps.is_empty() {
        return Err(ChainError::ConfigError(
            "chain file must contain at least one [[step]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_chain_section(cfg: &RawChainFile) -> Result<()> {
    if cfg.chain.name.trim().is_empty() {
        return Err(ChainError::ConfigError(
            "[chain].name must not be empty".to_string(),
        ));
    }

    if cfg.chain.cancel_after_ms == Some(0) {
        return Err(ChainError::ConfigError(
            "[chain].cancel_after_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_step_names(cfg: &RawChainFile) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::new();

    for (index, step) in cfg.steps.iter().enumerate() {
        let name = step.name.trim();
        if name.is_empty() {
            return Err(ChainError::ConfigError(format!(
                "step #{index} has an empty name"
            )));
        }
        if !seen.insert(name) {
            return Err(ChainError::ConfigError(format!(
                "duplicate step name '{name}'"
            )));
        }
    }

    Ok(())
}

fn validate_step_timing(cfg: &RawChainFile) -> Result<()> {
    for step in cfg.steps.iter() {
        if step.ticks > 0 && step.tick_ms == 0 {
            return Err(ChainError::ConfigError(format!(
                "step '{}' counts {} ticks but tick_ms is 0",
                step.name, step.ticks
            )));
        }
    }
    Ok(())
}
