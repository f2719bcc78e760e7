use log::warn;
use serde::Deserialize;
use std::path::PathBuf;
use uuid::Uuid;

/// Profile injected on every request when `auth_disabled` is set.
pub const DEFAULT_MOCK_PROFILE_ID: Uuid = Uuid::from_u128(0x57329df6_9f7a_4dad_9383_4633b452efab);

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    pub listen_addr: String,
    pub listen_port: u16,
    pub auth_disabled: bool,
    pub mock_profile_id: Uuid,
    /// Width of the measurement window used when a request omits `after`.
    pub default_window_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("instrumentation.sqlite3"),
            listen_addr: "127.0.0.1".to_string(),
            listen_port: 8080,
            auth_disabled: false,
            mock_profile_id: DEFAULT_MOCK_PROFILE_ID,
            default_window_days: 7,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        if let Ok(config_path) = std::env::var("INSTRUMENTATION_CONFIG") {
            let path = PathBuf::from(config_path);
            match Self::from_file(&path) {
                Ok(config) => return config,
                Err(e) => warn!("Ignoring config file {}: {:#}", path.display(), e),
            }
        }
        Self::default()
    }

    pub fn from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}
