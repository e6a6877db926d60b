use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::net::reduce::ReductionOptions;

/// Settings of [`translate_and_reduce`](crate::pipeline::translate_and_reduce), loadable
/// from a TOML file. Missing keys take their defaults.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Keep boundary events as labelled transitions.
    #[serde(default = "default_true")]
    pub include_events: bool,
    #[serde(default = "default_true")]
    pub reduce: bool,
    /// Refuse nets whose final marking is unreachable.
    #[serde(default)]
    pub check_soundness: bool,
    /// Bound for the soundness state-space search.
    #[serde(default = "default_state_limit")]
    pub state_limit: Option<usize>,
    #[serde(default)]
    pub reduction: ReductionConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            include_events: true,
            reduce: true,
            check_soundness: false,
            state_limit: default_state_limit(),
            reduction: ReductionConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: PipelineConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }
}

/// The opt-in reduction rules, see [`ReductionOptions`].
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ReductionConfig {
    #[serde(default)]
    pub parallel_transitions: bool,
    #[serde(default)]
    pub parallel_places: bool,
    #[serde(default)]
    pub abstraction: bool,
    #[serde(default = "default_exhaustive_limit")]
    pub exhaustive_limit: usize,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            parallel_transitions: false,
            parallel_places: false,
            abstraction: false,
            exhaustive_limit: default_exhaustive_limit(),
        }
    }
}

impl From<&ReductionConfig> for ReductionOptions {
    fn from(config: &ReductionConfig) -> Self {
        ReductionOptions {
            parallel_transitions: config.parallel_transitions,
            parallel_places: config.parallel_places,
            abstraction: config.abstraction,
            exhaustive_limit: config.exhaustive_limit,
            ..ReductionOptions::default()
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_state_limit() -> Option<usize> {
    Some(100_000)
}

fn default_exhaustive_limit() -> usize {
    ReductionOptions::default().exhaustive_limit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = PipelineConfig::load_from_file("does/not/exist.toml").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!(config.include_events);
        assert!(config.reduce);
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_keys() {
        let config: PipelineConfig = toml::from_str(
            r#"
            include_events = false
            check_soundness = true

            [reduction]
            parallel_places = true
            "#,
        )
        .unwrap();
        assert!(!config.include_events);
        assert!(config.reduce);
        assert!(config.check_soundness);
        assert!(config.reduction.parallel_places);
        assert!(!config.reduction.abstraction);
        assert_eq!(config.reduction.exhaustive_limit, 64);

        let options = ReductionOptions::from(&config.reduction);
        assert!(options.parallel_places);
        assert!(!options.parallel_transitions);
    }

    #[test]
    fn load_from_file_reports_parse_errors() {
        let dir = std::env::temp_dir().join("bpmn-rinet-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.toml");
        std::fs::write(&path, "reduce = \"maybe\"").unwrap();
        let err = PipelineConfig::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
