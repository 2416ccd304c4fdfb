use crate::capture::CaptureStrategy;
use crate::orientation::OrientationPolicy;
use crate::region_store::FocusMode;
use crate::settings::{keys, SettingsStore};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{Result, StillcamError};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct StillcamConfig {
    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub focus: FocusConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// Target image width in pixels
    #[serde(default = "default_capture_width")]
    pub width: u32,

    /// Target image height in pixels
    #[serde(default = "default_capture_height")]
    pub height: u32,

    /// Orientation policy applied to captured images
    #[serde(default)]
    pub orientation: OrientationPolicy,

    /// Frames produced per capture trigger
    #[serde(default)]
    pub strategy: CaptureStrategy,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FocusConfig {
    /// Autofocus mode
    #[serde(default)]
    pub mode: FocusMode,

    /// Metering field width in sensor pixels
    #[serde(default = "default_field_size")]
    pub field_width: i32,

    /// Metering field height in sensor pixels
    #[serde(default = "default_field_size")]
    pub field_height: i32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Base path for stored images
    #[serde(default = "default_storage_path")]
    pub path: String,
}

fn default_capture_width() -> u32 {
    4000
}

fn default_capture_height() -> u32 {
    3000
}

fn default_field_size() -> i32 {
    100
}

fn default_storage_path() -> String {
    "./images".to_string()
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: default_capture_width(),
            height: default_capture_height(),
            orientation: OrientationPolicy::default(),
            strategy: CaptureStrategy::default(),
        }
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            mode: FocusMode::default(),
            field_width: default_field_size(),
            field_height: default_field_size(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

impl StillcamConfig {
    /// Load configuration from a TOML file, with `STILLCAM_` prefixed
    /// environment variables taking precedence
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("STILLCAM").separator("__"))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;

        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(StillcamError::system("Capture size must be non-zero"));
        }
        if self.focus.field_width <= 0 || self.focus.field_height <= 0 {
            return Err(StillcamError::system(
                "Focus field dimensions must be positive",
            ));
        }
        if let CaptureStrategy::Burst { count } = self.capture.strategy {
            if count == 0 {
                return Err(StillcamError::system("Burst count must be non-zero"));
            }
        }
        Ok(())
    }

    /// Seed a settings store with the preference values this
    /// configuration implies
    pub fn apply_to_settings(&self, settings: &dyn SettingsStore) {
        settings.put_string(
            keys::JPEG_ORIENTATION,
            self.capture.orientation.pref_value(),
        );
        settings.put_string(keys::AF_MODE, self.focus.mode.pref_value());
        settings.put_string(keys::CAPTURE_WIDTH, &self.capture.width.to_string());
        settings.put_string(keys::CAPTURE_HEIGHT, &self.capture.height.to_string());
        settings.put_string(
            keys::AF_FIELD_WIDTH,
            &self.focus.field_width.to_string(),
        );
        settings.put_string(
            keys::AF_FIELD_HEIGHT,
            &self.focus.field_height.to_string(),
        );
    }

    /// Default configuration rendered as TOML
    pub fn default_toml() -> Result<String> {
        Ok(toml::to_string_pretty(&Self::default())?)
    }
}
