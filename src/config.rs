//! Application configuration persisted as TOML
//!
//! Every section falls back to its defaults when missing, so a partial file
//! (or none at all) always yields a complete, working configuration.
//!
//! ```text
//! <config_dir>/multisense-kart/config.toml
//! ```

use crate::controller::pulse::PulseSettings;
use crate::mapping::duty_cycle::DutyCycleSettings;
use crate::server::input_server::InputServerSettings;
use crate::sources::{FaceSettings, MarkerSettings, PedalSettings, PhoneSettings, VoiceSettings};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = "multisense-kart";
const CONFIG_FILE: &str = "config.toml";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Where outbound commands are sent
    pub destination: SocketAddr,
    pub input_server: InputServerSettings,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            destination: SocketAddr::from((Ipv4Addr::LOCALHOST, 6006)),
            input_server: InputServerSettings::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub duty_cycle: DutyCycleSettings,
    pub pulse: PulseSettings,
    pub phone: PhoneSettings,
    pub face: FaceSettings,
    pub markers: MarkerSettings,
    pub pedals: PedalSettings,
    pub voice: VoiceSettings,
}

impl AppConfig {
    /// Default location of the configuration file
    pub fn default_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir().ok_or_else(|| eyre!("No configuration directory"))?;
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        Ok(path)
    }

    /// Writes the default configuration unless a file already exists
    pub async fn ensure_default_config() -> Result<PathBuf> {
        let path = Self::default_path()?;
        if tokio::fs::try_exists(&path)
            .await
            .map_err(|e| eyre!("Failed to check config file: {}", e))?
        {
            debug!("Config file present: {}", path.display());
        } else {
            info!("Writing default config to {}", path.display());
            Self::default().save_to(&path).await?;
        }
        Ok(path)
    }

    pub async fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?).await
    }

    /// Reads `path`, defaults when the file does not exist
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check config file: {}", e))?
        {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file: {}", e))?;
        let config: Self =
            toml::from_str(&content).map_err(|e| eyre!("Failed to parse config file: {}", e))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| eyre!("Failed to serialize config: {}", e))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write config file: {}", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Button;
    use crate::sources::PhoneMode;

    fn scratch_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("multisense-kart-{}-{}", name, std::process::id()));
        path.push(CONFIG_FILE);
        path
    }

    #[tokio::test]
    async fn missing_file_gives_defaults() {
        let config = AppConfig::load_from(&scratch_path("missing")).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.duty_cycle.frequency_hz, 60.0);
        assert_eq!(config.network.input_server.ports, vec![6006, 6007, 6008, 6009, 6010]);
    }

    #[tokio::test]
    async fn save_then_load() {
        let path = scratch_path("saved");
        let mut config = AppConfig::default();
        config.phone.mode = PhoneMode::Perf;
        config.voice.keywords.insert("help".to_string(), Button::Rescue);

        config.save_to(&path).await.unwrap();
        let loaded = AppConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded, config);

        if let Some(dir) = path.parent() {
            let _ = tokio::fs::remove_dir_all(dir).await;
        }
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [network]
            destination = "192.168.1.20:6006"

            [phone]
            mode = "perf"

            [phone.taps.left]
            double_tap = "Nitro"
            hold = "Fire"
            "#,
        )
        .unwrap();

        assert_eq!(config.network.destination.port(), 6006);
        assert_eq!(config.network.input_server, InputServerSettings::default());
        assert_eq!(config.phone.mode, PhoneMode::Perf);
        assert_eq!(config.phone.roll_limit_deg, 30.0);
        assert_eq!(config.phone.taps.left.double_tap, Button::Nitro);
        assert_eq!(config.phone.taps.tap_window_ms, 200);
        assert_eq!(config.pedals, PedalSettings::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(toml::from_str::<AppConfig>("[duty_cycle]\ncycle_ticks = \"ten\"").is_err());
    }
}
