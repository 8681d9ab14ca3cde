// src/config/model.rs

use serde::Deserialize;

/// Chain description as read from a TOML file.
///
/// ```toml
/// [chain]
/// name = "demo"
/// cancel_after_ms = 2500
///
/// [[step]]
/// name = "node1"
///
/// [[step]]
/// name = "node2"
/// ticks = 5
/// tick_ms = 1000
/// ```
///
/// This is the unvalidated form. Use [`ChainFile`] (via `TryFrom`) for
/// anything that actually builds a chain.
#[derive(Debug, Clone, Deserialize)]
pub struct RawChainFile {
    /// Chain-wide settings from `[chain]`.
    #[serde(default)]
    pub chain: ChainSection,

    /// Steps from `[[step]]`, in execution order.
    #[serde(default, rename = "step")]
    pub steps: Vec<StepConfig>,
}

/// `[chain]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainSection {
    /// Label used in logs.
    #[serde(default = "default_chain_name")]
    pub name: String,

    /// Cancel the whole chain this many milliseconds after start.
    #[serde(default)]
    pub cancel_after_ms: Option<u64>,
}

fn default_chain_name() -> String {
    "chain".to_string()
}

impl Default for ChainSection {
    fn default() -> Self {
        Self {
            name: default_chain_name(),
            cancel_after_ms: None,
        }
    }
}

/// One `[[step]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StepConfig {
    pub name: String,

    /// Number of ticks to count before advancing. `0` advances right away.
    #[serde(default)]
    pub ticks: u32,

    /// Delay between ticks.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Cancel the chain from inside this step's `on_run`.
    #[serde(default)]
    pub cancel_chain: bool,
}

fn default_tick_ms() -> u64 {
    1000
}

impl StepConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ticks: 0,
            tick_ms: default_tick_ms(),
            cancel_chain: false,
        }
    }

    pub fn with_ticks(mut self, ticks: u32, tick_ms: u64) -> Self {
        self.ticks = ticks;
        self.tick_ms = tick_ms;
        self
    }
}

/// A validated chain description.
#[derive(Debug, Clone)]
pub struct ChainFile {
    pub chain: ChainSection,
    pub steps: Vec<StepConfig>,
}

impl ChainFile {
    /// Build without validation. Callers outside `config` go through
    /// `TryFrom<RawChainFile>`.
    pub(crate) fn new_unchecked(chain: ChainSection, steps: Vec<StepConfig>) -> Self {
        Self { chain, steps }
    }

    /// The built-in three-step demo: an instant step, a step counting five
    /// one-second ticks, another instant step.
    pub fn builtin_demo() -> Self {
        Self::new_unchecked(
            ChainSection {
                name: "demo".to_string(),
                cancel_after_ms: None,
            },
            vec![
                StepConfig::new("node1"),
                StepConfig::new("node2").with_ticks(5, 1000),
                StepConfig::new("node3"),
            ],
        )
    }
}
