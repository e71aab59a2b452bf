use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub map: MapConfig,
    pub geocoding: GeocodingConfig,
    pub photo: PhotoConfig,
    pub geolocation: GeolocationConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Tree,
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRotation {
    Daily,
    Hourly,
    Minutely,
    Never,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub stdout: bool,
    pub stdout_format: LogFormat,
    pub filter: Option<String>,
    pub file: FileLoggingConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            stdout: true,
            stdout_format: LogFormat::Tree,
            filter: None,
            file: FileLoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    pub enabled: bool,
    pub dir: Option<PathBuf>,
    pub format: LogFormat,
    pub rotation: LogRotation,
    pub retention_max_age_days: Option<u64>,
    pub retention_max_files: Option<usize>,
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: None,
            format: LogFormat::Json,
            rotation: LogRotation::Daily,
            retention_max_age_days: Some(7),
            retention_max_files: Some(10),
        }
    }
}

/// Initial map position. The census started in central Cochabamba.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub zoom: u8,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center_latitude: -17.369668,
            center_longitude: -66.168309,
            zoom: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://nominatim.openstreetmap.org".to_string(),
            timeout_ms: 5_000,
            user_agent: format!("arbolado/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoConfig {
    /// JPEG quality, 1..=100.
    pub quality: u8,
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self { quality: 90 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeolocationConfig {
    pub high_accuracy: bool,
    pub timeout_ms: u64,
    pub maximum_age_ms: u64,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: 10_000,
            maximum_age_ms: 0,
        }
    }
}

/// One config file. Every field is optional; present fields win over the
/// layer below.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConfigLayer {
    pub logging: LoggingConfigOverride,
    pub map: MapConfigOverride,
    pub geocoding: GeocodingConfigOverride,
    pub photo: PhotoConfigOverride,
    pub geolocation: GeolocationConfigOverride,
}

impl ConfigLayer {
    pub fn apply_to(&self, config: &mut Config) {
        self.logging.apply_to(&mut config.logging);
        self.map.apply_to(&mut config.map);
        self.geocoding.apply_to(&mut config.geocoding);
        self.photo.apply_to(&mut config.photo);
        self.geolocation.apply_to(&mut config.geolocation);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfigOverride {
    pub stdout: Option<bool>,
    pub stdout_format: Option<LogFormat>,
    pub filter: Option<String>,
    pub file: Option<FileLoggingConfigOverride>,
}

impl LoggingConfigOverride {
    pub fn apply_to(&self, target: &mut LoggingConfig) {
        if let Some(stdout) = self.stdout {
            target.stdout = stdout;
        }
        if let Some(format) = self.stdout_format {
            target.stdout_format = format;
        }
        if let Some(filter) = self.filter.as_ref() {
            target.filter = Some(filter.clone());
        }
        if let Some(file) = self.file.as_ref() {
            file.apply_to(&mut target.file);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FileLoggingConfigOverride {
    pub enabled: Option<bool>,
    pub dir: Option<PathBuf>,
    pub format: Option<LogFormat>,
    pub rotation: Option<LogRotation>,
    pub retention_max_age_days: Option<u64>,
    pub retention_max_files: Option<usize>,
}

impl FileLoggingConfigOverride {
    pub fn apply_to(&self, target: &mut FileLoggingConfig) {
        if let Some(enabled) = self.enabled {
            target.enabled = enabled;
        }
        if let Some(dir) = self.dir.as_ref() {
            target.dir = Some(dir.clone());
        }
        if let Some(format) = self.format {
            target.format = format;
        }
        if let Some(rotation) = self.rotation {
            target.rotation = rotation;
        }
        if let Some(days) = self.retention_max_age_days {
            target.retention_max_age_days = Some(days);
        }
        if let Some(files) = self.retention_max_files {
            target.retention_max_files = Some(files);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MapConfigOverride {
    pub center_latitude: Option<f64>,
    pub center_longitude: Option<f64>,
    pub zoom: Option<u8>,
}

impl MapConfigOverride {
    pub fn apply_to(&self, target: &mut MapConfig) {
        if let Some(lat) = self.center_latitude {
            target.center_latitude = lat;
        }
        if let Some(lng) = self.center_longitude {
            target.center_longitude = lng;
        }
        if let Some(zoom) = self.zoom {
            target.zoom = zoom;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GeocodingConfigOverride {
    pub enabled: Option<bool>,
    pub endpoint: Option<String>,
    pub timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
}

impl GeocodingConfigOverride {
    pub fn apply_to(&self, target: &mut GeocodingConfig) {
        if let Some(enabled) = self.enabled {
            target.enabled = enabled;
        }
        if let Some(endpoint) = self.endpoint.as_ref() {
            target.endpoint = endpoint.clone();
        }
        if let Some(timeout) = self.timeout_ms {
            target.timeout_ms = timeout;
        }
        if let Some(agent) = self.user_agent.as_ref() {
            target.user_agent = agent.clone();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PhotoConfigOverride {
    pub quality: Option<u8>,
}

impl PhotoConfigOverride {
    pub fn apply_to(&self, target: &mut PhotoConfig) {
        if let Some(quality) = self.quality {
            target.quality = quality.clamp(1, 100);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GeolocationConfigOverride {
    pub high_accuracy: Option<bool>,
    pub timeout_ms: Option<u64>,
    pub maximum_age_ms: Option<u64>,
}

impl GeolocationConfigOverride {
    pub fn apply_to(&self, target: &mut GeolocationConfig) {
        if let Some(high) = self.high_accuracy {
            target.high_accuracy = high;
        }
        if let Some(timeout) = self.timeout_ms {
            target.timeout_ms = timeout;
        }
        if let Some(age) = self.maximum_age_ms {
            target.maximum_age_ms = age;
        }
    }
}
