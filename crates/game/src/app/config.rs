use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub(crate) const CONFIG_ENV_VAR: &str = "SCENEZONE_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct GameConfig {
    pub(crate) target_tps: u32,
    pub(crate) max_ticks_per_frame: u32,
    pub(crate) tick_limit: Option<u64>,
    pub(crate) global_zone_kib: usize,
    pub(crate) scene_zone_kib: usize,
    pub(crate) start_scene: u16,
    pub(crate) title_hold_ticks: u64,
    pub(crate) field_width: usize,
    pub(crate) field_height: usize,
    pub(crate) field_linger_ticks: u64,
    pub(crate) rng_seed: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_ticks_per_frame: 5,
            tick_limit: Some(600),
            global_zone_kib: 64,
            scene_zone_kib: 256,
            start_scene: 0,
            title_hold_ticks: 90,
            field_width: 48,
            field_height: 32,
            field_linger_ticks: 300,
            rng_seed: 7,
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path} at {location}: {source}")]
    Parse {
        path: PathBuf,
        location: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Load the sandbox config from the file named by `SCENEZONE_CONFIG`, or
/// fall back to the built-in defaults when the variable is unset.
pub(crate) fn load_config() -> Result<GameConfig, ConfigError> {
    match env::var(CONFIG_ENV_VAR) {
        Ok(path) => {
            let config = load_config_from_path(Path::new(&path))?;
            info!(path = path.as_str(), "config_loaded");
            Ok(config)
        }
        Err(_) => {
            info!(env_var = CONFIG_ENV_VAR, "no config file set; using defaults");
            Ok(GameConfig::default())
        }
    }
}

pub(crate) fn load_config_from_path(path: &Path) -> Result<GameConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut deserializer = serde_json::Deserializer::from_str(&raw);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        location: err.path().to_string(),
        source: err.into_inner(),
    })
}
