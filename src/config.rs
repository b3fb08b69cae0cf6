use anyhow::{Context, Result};
use evdev::KeyCode;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

pub(crate) fn config() -> Result<Config> {
    let config_path = match env::args().nth(1) {
        Some(arg_path) => PathBuf::from(arg_path),
        None => dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("pedalkeys")
            .join("config.yml"),
    };

    let config = if !config_path.exists() {
        let config = Config::default();
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_yaml::to_string(&config)?;
        fs::write(&config_path, serialized)?;
        info!("Default config written to {}", config_path.display());
        config
    } else {
        let config_content = fs::read_to_string(&config_path)?;
        parse(&config_path, &config_content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?
    };

    debug!("Config: {:#?}", config);

    Ok(config)
}

fn parse(path: &Path, content: &str) -> Result<Config> {
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        Ok(toml::from_str(content)?)
    } else {
        Ok(serde_yaml::from_str(content)?)
    }
}

fn default_pedal_tap_time() -> u64 {
    1000
}

fn default_no_emit() -> bool {
    false
}

fn default_pedal_device() -> String {
    "PCsensor FootSwitch".to_owned()
}

fn default_pedal_key() -> KeyCode {
    KeyCode::KEY_F13
}

fn default_keyboards() -> Vec<String> {
    vec!["AT Translated Set 2 keyboard".to_owned()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Config {
    #[serde(default)]
    pub globals: Globals,
    #[serde(default)]
    pub pedal: PedalConfig,
    #[serde(default = "default_keyboards")]
    pub keyboards: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Globals {
    #[serde(default = "default_pedal_tap_time")]
    pub pedal_tap_time: u64,
    #[serde(default = "default_no_emit")]
    pub no_emit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PedalConfig {
    #[serde(default = "default_pedal_device")]
    pub device: String,
    #[serde(default = "default_pedal_key")]
    pub key: KeyCode,
}

impl Globals {
    pub fn pedal_tap_time(&self) -> Duration {
        Duration::from_millis(self.pedal_tap_time)
    }
}

impl Default for Globals {
    fn default() -> Self {
        Self {
            pedal_tap_time: default_pedal_tap_time(),
            no_emit: default_no_emit(),
        }
    }
}

impl Default for PedalConfig {
    fn default() -> Self {
        Self {
            device: default_pedal_device(),
            key: default_pedal_key(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            globals: Globals::default(),
            pedal: PedalConfig::default(),
            keyboards: default_keyboards(),
        }
    }
}
