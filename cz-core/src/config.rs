//! YAML configuration schema for search runs.
//!
//! Every field has a default, so an empty document is a valid config.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Search settings.
    #[serde(default)]
    pub mcts: MctsConfig,
    /// Move selection from a finished search.
    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Exploration bonus formula used during selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UcbVariant {
    /// `C * prior * sqrt(1 + trials) / (1 + n)`.
    #[default]
    AlphaZero,
    /// `C * prior * sqrt(ln(1 + trials) / (1 + n))`.
    Classic,
}

/// Search configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MctsConfig {
    /// Exploration constant.
    #[serde(default = "default_c_puct")]
    pub c_puct: f32,
    #[serde(default)]
    pub ucb: UcbVariant,
    /// Trial budget per search. `None` leaves only the time budget.
    #[serde(default = "default_max_trials")]
    pub max_trials: Option<u32>,
    /// Wall-clock budget per search, polled between trials.
    #[serde(default)]
    pub max_time_ms: Option<u64>,
    /// Dirichlet concentration for expansion noise.
    #[serde(default = "default_dirichlet_alpha")]
    pub dirichlet_alpha: f32,
    /// Noise weight; the estimator prior gets `1 - epsilon`.
    #[serde(default = "default_dirichlet_epsilon")]
    pub dirichlet_epsilon: f32,
    /// Number of state keys handed to the estimator.
    #[serde(default = "default_history_len")]
    pub history_len: usize,
    #[serde(default)]
    pub seed: u64,
    /// Cap on random rollout length; a capped rollout scores 0.
    #[serde(default)]
    pub max_rollout_plies: Option<u32>,
}

fn default_c_puct() -> f32 {
    10.0
}

fn default_max_trials() -> Option<u32> {
    Some(500)
}

fn default_dirichlet_alpha() -> f32 {
    0.3
}

fn default_dirichlet_epsilon() -> f32 {
    0.25
}

fn default_history_len() -> usize {
    8
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            c_puct: default_c_puct(),
            ucb: UcbVariant::default(),
            max_trials: default_max_trials(),
            max_time_ms: None,
            dirichlet_alpha: default_dirichlet_alpha(),
            dirichlet_epsilon: default_dirichlet_epsilon(),
            history_len: default_history_len(),
            seed: 0,
            max_rollout_plies: None,
        }
    }
}

/// Move selection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolicyConfig {
    /// Visit-count temperature. 0 picks the most visited move.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_temperature() -> f32 {
    1.0
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_default_yaml() {
        let config =
            Config::load("../configs/default.yaml").expect("Failed to load configs/default.yaml");
        assert_eq!(config.mcts.c_puct, 10.0);
        assert_eq!(config.mcts.max_trials, Some(500));
        assert_eq!(config.mcts.max_time_ms, None);
        assert_eq!(config.mcts.ucb, UcbVariant::AlphaZero);
        assert_eq!(config.mcts.history_len, 8);
        assert_eq!(config.policy.temperature, 1.0);
    }

    #[test]
    fn test_parse_yaml_string() {
        let yaml = r#"
mcts:
  c_puct: 1.5
  ucb: classic
  max_trials: null
  max_time_ms: 250
  seed: 42
  max_rollout_plies: 200

policy:
  temperature: 0.0
"#;

        let config = Config::from_yaml(yaml).expect("Failed to parse YAML");
        assert_eq!(config.mcts.c_puct, 1.5);
        assert_eq!(config.mcts.ucb, UcbVariant::Classic);
        assert_eq!(config.mcts.max_trials, None);
        assert_eq!(config.mcts.max_time_ms, Some(250));
        assert_eq!(config.mcts.seed, 42);
        assert_eq!(config.mcts.max_rollout_plies, Some(200));
        // Unset fields keep their defaults.
        assert!((config.mcts.dirichlet_alpha - 0.3).abs() < 1e-9);
        assert!((config.mcts.dirichlet_epsilon - 0.25).abs() < 1e-9);
        assert_eq!(config.policy.temperature, 0.0);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_yaml("{}").expect("Failed to parse YAML");
        assert_eq!(config.mcts.max_trials, Some(500));
        assert_eq!(config.mcts.seed, 0);
    }

    #[test]
    fn test_unknown_ucb_variant_fails() {
        let err = Config::from_yaml("mcts:\n  ucb: greedy\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }
}
