//! Engine configuration
//!
//! Settings are layered, lowest priority first:
//! 1. Built-in defaults
//! 2. A TOML file (`stepwise.toml` in the working directory, or an explicit path)
//! 3. `STEPWISE_*` environment variables
//! 4. Values set on the builder

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_STEP_BUDGET: i32 = 100;
const DEFAULT_MAX_DEPTH: usize = 990;
const DEFAULT_GUARD_SLOTS: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// State changes allowed per resumption before the run yields
    #[serde(default = "default_step_budget")]
    pub step_budget: i32,

    /// Frames available before calls start failing with a stack overflow
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Extra frames tolerated past `max_depth`; running past them is a stack overflow too
    #[serde(default = "default_guard_slots")]
    pub guard_slots: usize,

    /// Pause once at the start of every block
    #[serde(default)]
    pub single_step: bool,
}

fn default_step_budget() -> i32 {
    DEFAULT_STEP_BUDGET
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_guard_slots() -> usize {
    DEFAULT_GUARD_SLOTS
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            step_budget: DEFAULT_STEP_BUDGET,
            max_depth: DEFAULT_MAX_DEPTH,
            guard_slots: DEFAULT_GUARD_SLOTS,
            single_step: false,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Load from the default file and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.step_budget < 1 {
            return Err(ConfigError::Invalid(format!(
                "step_budget must be at least 1, got {}",
                self.step_budget
            )));
        }
        if self.max_depth < 1 {
            return Err(ConfigError::Invalid("max_depth must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config_path: Option<PathBuf>,
    step_budget: Option<i32>,
    max_depth: Option<usize>,
    single_step: Option<bool>,
}

impl EngineConfigBuilder {
    /// Read this file instead of the optional `stepwise.toml`; it must exist
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn step_budget(mut self, budget: Option<i32>) -> Self {
        self.step_budget = budget;
        self
    }

    pub fn max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn single_step(mut self, on: Option<bool>) -> Self {
        self.single_step = on;
        self
    }

    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("step_budget", DEFAULT_STEP_BUDGET as i64)?
            .set_default("max_depth", DEFAULT_MAX_DEPTH as i64)?
            .set_default("guard_slots", DEFAULT_GUARD_SLOTS as i64)?
            .set_default("single_step", false)?;

        builder = match self.config_path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name("stepwise").required(false)),
        };
        builder = builder.add_source(config::Environment::with_prefix("STEPWISE").try_parsing(true));

        if let Some(budget) = self.step_budget {
            builder = builder.set_override("step_budget", budget as i64)?;
        }
        if let Some(depth) = self.max_depth {
            builder = builder.set_override("max_depth", depth as i64)?;
        }
        if let Some(on) = self.single_step {
            builder = builder.set_override("single_step", on)?;
        }

        let config: EngineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
