//! Configuration file support for Repset.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/repset/config.toml`.

use crate::{Error, Result, SetPlan};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub drag: DragConfig,

    #[serde(default)]
    pub sets: SetDefaults,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Drag gesture tuning
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DragConfig {
    /// Slack added around target boxes when testing overlap
    #[serde(default = "default_overlap_margin")]
    pub overlap_margin: f32,

    /// Horizontal travel beyond which a swipe removes the exercise
    #[serde(default = "default_swipe_threshold")]
    pub swipe_threshold: f32,

    #[serde(default = "default_swap_target_debounce_ms")]
    pub swap_target_debounce_ms: u64,
}

impl DragConfig {
    pub fn swap_target_debounce(&self) -> Duration {
        Duration::from_millis(self.swap_target_debounce_ms)
    }
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            overlap_margin: default_overlap_margin(),
            swipe_threshold: default_swipe_threshold(),
            swap_target_debounce_ms: default_swap_target_debounce_ms(),
        }
    }
}

/// Defaults applied when an exercise is added from the catalog
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SetDefaults {
    #[serde(default = "default_set_count")]
    pub default_set_count: usize,

    #[serde(default = "default_reps")]
    pub default_reps: u32,

    #[serde(default = "default_seconds")]
    pub default_seconds: u32,

    #[serde(default = "default_rest_seconds")]
    pub default_rest_seconds: u32,
}

impl Default for SetDefaults {
    fn default() -> Self {
        Self {
            default_set_count: default_set_count(),
            default_reps: default_reps(),
            default_seconds: default_seconds(),
            default_rest_seconds: default_rest_seconds(),
        }
    }
}

impl SetDefaults {
    /// Set plan for a catalog exercise measured in `measurement`
    pub fn plan_for(&self, measurement: crate::Measurement) -> SetPlan {
        let target = match measurement {
            crate::Measurement::Reps => self.default_reps,
            crate::Measurement::Time => self.default_seconds,
        };
        SetPlan {
            set_count: self.default_set_count,
            target: f64::from(target),
            rest_time_seconds: self.default_rest_seconds,
            load: 0.0,
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("repset")
}

fn default_overlap_margin() -> f32 {
    20.0
}

fn default_swipe_threshold() -> f32 {
    500.0
}

fn default_swap_target_debounce_ms() -> u64 {
    100
}

fn default_set_count() -> usize {
    3
}

fn default_reps() -> u32 {
    10
}

fn default_seconds() -> u32 {
    30
}

fn default_rest_seconds() -> u32 {
    60
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject values the drag engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.drag.overlap_margin >= 0.0) {
            return Err(Error::Config(format!(
                "drag.overlap_margin must be >= 0, got {}",
                self.drag.overlap_margin
            )));
        }
        if !(self.drag.swipe_threshold > 0.0) {
            return Err(Error::Config(format!(
                "drag.swipe_threshold must be > 0, got {}",
                self.drag.swipe_threshold
            )));
        }
        if self.sets.default_set_count == 0 {
            return Err(Error::Config("sets.default_set_count must be > 0".into()));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("repset").join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Measurement;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.drag.overlap_margin, 20.0);
        assert_eq!(config.drag.swipe_threshold, 500.0);
        assert_eq!(config.drag.swap_target_debounce(), Duration::from_millis(100));
        assert_eq!(config.sets.default_set_count, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.drag, parsed.drag);
        assert_eq!(config.sets, parsed.sets);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[drag]
overlap_margin = 8.0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.drag.overlap_margin, 8.0);
        assert_eq!(config.drag.swipe_threshold, 500.0); // default
        assert_eq!(config.sets.default_rest_seconds, 60);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[drag]\nswipe_threshold = 0.0\n").unwrap();

        let result = Config::load_from(&path);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_plan_for_measurement() {
        let sets = SetDefaults::default();
        assert_eq!(sets.plan_for(Measurement::Reps).target, 10.0);
        assert_eq!(sets.plan_for(Measurement::Time).target, 30.0);
        assert_eq!(sets.plan_for(Measurement::Time).rest_time_seconds, 60);
    }
}
