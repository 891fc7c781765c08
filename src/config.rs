//! Runtime configuration, read from a TOML file
//!
//! ```toml
//! [locker]
//! lock_count = 10
//!
//! [planets]
//! creation_trials = 10
//! default_fields = 163
//!
//! [actions]
//! allow_building_downgrade = false
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::locker::DEFAULT_LOCK_COUNT;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub locker: LockerConfig,
    pub planets: PlanetConfig,
    pub actions: ActionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockerConfig {
    pub lock_count: usize,
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self {
            lock_count: DEFAULT_LOCK_COUNT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanetConfig {
    /// Random coordinates drawn before giving up on a crowded universe.
    pub creation_trials: usize,
    pub default_fields: i64,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub diameter: i64,
}

impl Default for PlanetConfig {
    fn default() -> Self {
        Self {
            creation_trials: 10,
            default_fields: 163,
            min_temperature: -20.0,
            max_temperature: 30.0,
            diameter: 12800,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    /// Accept building actions going down one level.
    pub allow_building_downgrade: bool,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Load `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = Config::parse("[locker]\nlock_count = 3\n").unwrap();
        assert_eq!(config.locker.lock_count, 3);
        assert_eq!(config.planets, PlanetConfig::default());
        assert!(!config.actions.allow_building_downgrade);
    }

    #[test]
    fn empty_file_is_the_default_config() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn unknown_types_are_rejected() {
        let err = Config::parse("[planets]\ncreation_trials = \"many\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_names_the_path() {
        let path = std::env::temp_dir().join(format!("oglike-{}.toml", crate::models::new_id()));
        let err = Config::load_or_default(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains(&path.display().to_string()), "{err}");

        assert_eq!(Config::load_or_default(None).unwrap(), Config::default());
    }
}
