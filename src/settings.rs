use parking_lot::RwLock;
use std::collections::HashMap;

/// Preference keys shared with existing installations. The names are an
/// interop contract; values written under them must stay readable by
/// older deployments.
pub mod keys {
    /// Orientation policy applied to captured JPEGs
    pub const JPEG_ORIENTATION: &str = "jpeg_orientation";
    /// Active autofocus mode
    pub const AF_MODE: &str = "pref_camera_af_mode";
    /// Last manually chosen metering region, tagged with sensor resolution
    pub const AF_FIELD: &str = "pref_camera_af_field";
    /// Metering field width in sensor pixels
    pub const AF_FIELD_WIDTH: &str = "pref_camera_af_field_width";
    /// Metering field height in sensor pixels
    pub const AF_FIELD_HEIGHT: &str = "pref_camera_af_field_height";
    /// Target capture width in pixels
    pub const CAPTURE_WIDTH: &str = "pref_camera_width";
    /// Target capture height in pixels
    pub const CAPTURE_HEIGHT: &str = "pref_camera_height";
    /// Sensor sensitivity override (ISO)
    pub const ISO: &str = "pref_camera_iso";
    /// Exposure compensation override
    pub const EXPOSURE: &str = "pref_camera_exposure";
    /// White balance mode override
    pub const WHITE_BALANCE: &str = "pref_camera_wb";
}

/// Preference-backed settings consumed by the capture and focus paths.
///
/// Reads are string/int lookups; the single write path persists structured
/// string values such as the last autofocus field.
pub trait SettingsStore: Send + Sync {
    fn get_string(&self, key: &str) -> Option<String>;

    fn get_int(&self, key: &str) -> Option<i32>;

    fn put_string(&self, key: &str, value: &str);
}

/// In-memory settings store for tests and headless use
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience write for integer-valued preferences
    pub fn put_int(&self, key: &str, value: i32) {
        self.put_string(key, &value.to_string());
    }

    /// Number of stored preference values
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl SettingsStore for MemorySettings {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn get_int(&self, key: &str) -> Option<i32> {
        self.values.read().get(key).and_then(|v| v.parse().ok())
    }

    fn put_string(&self, key: &str, value: &str) {
        self.values.write().insert(key.to_string(), value.to_string());
    }
}
