use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{fs, path::Path, time::Duration};

use crate::counters::PROC_NET_DEV;
use crate::png::DEFAULT_CHART_PATH;
use crate::rate::RolloverPolicy;
use crate::series::DEFAULT_SERIES_PATH;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_interface")]
    pub interface: String,
    #[serde(default = "default_series_path")]
    pub series_path: String,
    #[serde(default = "default_chart_path")]
    pub chart_path: String,
    /// Also open the terminal viewer after writing the image.
    #[serde(default)]
    pub view_chart: bool,
    #[serde(default = "default_counters_path")]
    pub counters_path: String,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub rollover: RolloverPolicy,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_seconds: u64,
    #[serde(default)]
    pub max_samples: Option<u64>,
}

fn default_interface() -> String {
    "wlan0".to_string()
}

fn default_series_path() -> String {
    DEFAULT_SERIES_PATH.to_string()
}

fn default_chart_path() -> String {
    DEFAULT_CHART_PATH.to_string()
}

fn default_counters_path() -> String {
    PROC_NET_DEV.to_string()
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_heartbeat_secs() -> u64 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            series_path: default_series_path(),
            chart_path: default_chart_path(),
            view_chart: false,
            counters_path: default_counters_path(),
            interval_ms: default_interval_ms(),
            log_level: default_log_level(),
            rollover: RolloverPolicy::default(),
            heartbeat_seconds: default_heartbeat_secs(),
            max_samples: None,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> &'static str {
        "config/netrate.toml"
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let raw = fs::read_to_string(path_ref)
            .with_context(|| format!("failed to read configuration from {}", path_ref.display()))?;
        let mut config: Self = toml::from_str(&raw).with_context(|| {
            format!("failed to parse configuration from {}", path_ref.display())
        })?;
        config.interface = config.interface.trim().to_string();
        Ok(config)
    }

    /// Loads the default configuration file when present, otherwise built-in defaults.
    pub fn load_or_default() -> Result<Self> {
        let path = Path::new(Self::default_path());
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.interface.is_empty() {
            bail!("interface name must not be empty");
        }
        if self.interface.contains(':') || self.interface.contains(char::is_whitespace) {
            bail!("interface name '{}' contains ':' or whitespace", self.interface);
        }
        if self.interval_ms == 0 {
            bail!("interval_ms must be greater than zero");
        }
        if self.heartbeat_seconds == 0 {
            bail!("heartbeat_seconds must be greater than zero");
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_seconds)
    }
}
