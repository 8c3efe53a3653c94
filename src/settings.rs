//! Layered configuration.
//!
//! Priority, lowest to highest:
//! 1. Built in defaults
//! 2. Global file: `<platform config dir>/city-buildings/config.toml`
//! 3. Project file: `./city-buildings.toml`
//! 4. Explicit `--config` file
//! 5. `CITY_BUILDINGS_*` environment variables, `__` between sections
//!    (e.g. `CITY_BUILDINGS_OVERPASS__MAX_RETRIES=4`)
//!
//! Command line flags are applied on top by the binary.

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::{overpass::FetchConfig, server::DEFAULT_STATIC_DIR};

pub const PROJECT_FILE: &str = "city-buildings.toml";
pub const ENV_PREFIX: &str = "CITY_BUILDINGS_";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub overpass: FetchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: SocketAddr,
    /// Used when a request carries no place name. `None` makes the name mandatory.
    pub default_place: Option<String>,
    /// Browser client files; `index.html` is served at `/`.
    pub static_dir: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            default_place: Some("Bangkok".to_string()),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
        }
    }
}

impl Settings {
    /// Loads every source listed in the module docs.
    pub fn load(config_path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));

        if let Some(global) = Self::global_config_path() {
            if global.exists() {
                figment = figment.merge(Toml::file(global));
            }
        }
        let project = PathBuf::from(PROJECT_FILE);
        if project.exists() {
            figment = figment.merge(Toml::file(project));
        }
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        Self::extract(figment)
    }

    /// Loads a single TOML file over the defaults, ignoring the environment.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        Self::extract(
            Figment::new()
                .merge(Serialized::defaults(Settings::default()))
                .merge(Toml::file(path)),
        )
    }

    fn extract(figment: Figment) -> Result<Self, SettingsError> {
        let mut settings: Settings = figment.extract().map_err(Box::new)?;
        settings.normalize();
        settings.validate()?;
        Ok(settings)
    }

    /// An empty `default_place` in a file or variable switches the fallback off.
    fn normalize(&mut self) {
        if self
            .server
            .default_place
            .as_deref()
            .is_some_and(|place| place.trim().is_empty())
        {
            self.server.default_place = None;
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.overpass.validate().map_err(SettingsError::Invalid)
    }

    pub fn global_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "city-buildings").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
