use anyhow::{anyhow, Result};
use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
use log::{debug, info, warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Configurable log level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    #[must_use]
    pub const fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::Off,
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
        }
    }
}

const NVS_NAMESPACE: &str = "lumeload";
const NVS_CONFIG_KEY: &str = "config";

// Global NVS handle - initialized once in main
static NVS: Mutex<Option<EspNvs<NvsDefault>>> = Mutex::new(None);

pub fn init_nvs(nvs_partition: EspNvsPartition<NvsDefault>) -> Result<()> {
    debug!("Initializing NVS namespace: {NVS_NAMESPACE}");
    let nvs = EspNvs::new(nvs_partition, NVS_NAMESPACE, true)?;
    *NVS.lock().unwrap_or_else(PoisonError::into_inner) = Some(nvs);
    info!("NVS initialized");
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WifiConfig {
    pub ssid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

pub const MIN_PIXELS: usize = 1;
pub const MAX_PIXELS: usize = 1024;
pub const MIN_FRAME_INTERVAL_MS: u64 = 5;
pub const MAX_FRAME_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub wifi: WifiConfig,
    /// mDNS hostname, reachable as `<hostname>.local`
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default = "default_led_gpio")]
    pub led_gpio: u8,
    /// Pixels on the strip (N)
    #[serde(default = "default_num_pixels")]
    pub num_pixels: usize,
    /// Minimum spacing between rendered frames
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_hostname() -> String {
    "lumeload".to_string()
}

const fn default_led_gpio() -> u8 {
    2
}

const fn default_num_pixels() -> usize {
    60
}

const fn default_frame_interval_ms() -> u64 {
    20
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wifi: WifiConfig::default(),
            hostname: default_hostname(),
            led_gpio: default_led_gpio(),
            num_pixels: default_num_pixels(),
            frame_interval_ms: default_frame_interval_ms(),
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Clamp values to valid ranges and fix invalid values
    pub fn validate(&mut self) {
        let num_pixels = self.num_pixels.clamp(MIN_PIXELS, MAX_PIXELS);
        if num_pixels != self.num_pixels {
            warn!("Clamping num_pixels from {} to {num_pixels}", self.num_pixels);
            self.num_pixels = num_pixels;
        }
        let interval = self.frame_interval_ms.clamp(MIN_FRAME_INTERVAL_MS, MAX_FRAME_INTERVAL_MS);
        if interval != self.frame_interval_ms {
            warn!("Clamping frame_interval_ms from {} to {interval}", self.frame_interval_ms);
            self.frame_interval_ms = interval;
        }
        if self.hostname.is_empty() {
            warn!("Hostname is empty, resetting to default");
            self.hostname = default_hostname();
        }
    }

    pub const fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(mut config) => {
                info!("Loaded config from NVS");
                config.validate();
                config
            }
            Err(e) => {
                warn!("Failed to load config from NVS: {e}, using defaults");
                Self::default()
            }
        }
    }

    pub fn load() -> Result<Self> {
        debug!("Loading config from NVS");
        let nvs_guard = NVS.lock().unwrap_or_else(PoisonError::into_inner);
        let nvs = nvs_guard.as_ref().ok_or_else(|| anyhow!("NVS not initialized"))?;

        let len = nvs.blob_len(NVS_CONFIG_KEY)?;
        if let Some(len) = len {
            debug!("Config blob size: {len} bytes");
            let mut buf = vec![0u8; len];
            nvs.get_blob(NVS_CONFIG_KEY, &mut buf)?;
            let config: Config = serde_json::from_slice(&buf)?;
            debug!(
                "Config parsed: wifi.ssid={:?}, num_pixels={}, led_gpio={}",
                config.wifi.ssid, config.num_pixels, config.led_gpio
            );
            Ok(config)
        } else {
            Err(anyhow!("No config found in NVS"))
        }
    }

    pub fn save(&self) -> Result<()> {
        debug!("Saving config to NVS");
        let mut nvs_guard = NVS.lock().unwrap_or_else(PoisonError::into_inner);
        let nvs = nvs_guard.as_mut().ok_or_else(|| anyhow!("NVS not initialized"))?;

        let json = serde_json::to_vec(self)?;
        debug!("Config JSON size: {} bytes", json.len());
        nvs.set_blob(NVS_CONFIG_KEY, &json)?;
        info!("Config saved to NVS");
        Ok(())
    }
}
