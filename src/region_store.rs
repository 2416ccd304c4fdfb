use crate::error::RegionError;
use crate::geometry::{SensorFocusRegion, SensorSize};
use crate::settings::{keys, SettingsStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Autofocus mode selected in the settings.
///
/// The serialized names are the preference values written by existing
/// installations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusMode {
    /// Continuous autofocus chosen by the device
    #[serde(rename = "auto")]
    Auto,
    /// Manually chosen metering field, persisted across sessions
    #[serde(rename = "field")]
    ManualField,
}

impl Default for FocusMode {
    fn default() -> Self {
        Self::Auto
    }
}

impl FocusMode {
    /// Parse the stored preference value; unknown values fall back to auto
    pub fn from_pref(value: &str) -> Self {
        match value {
            "field" => Self::ManualField,
            _ => Self::Auto,
        }
    }

    /// Preference value this mode is stored under
    pub fn pref_value(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::ManualField => "field",
        }
    }
}

/// A persisted metering region tagged with the sensor resolution it was
/// computed under. A region restored under a different resolution is
/// stale and must not be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredFocusRegion {
    pub sensor_width: i32,
    pub sensor_height: i32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl StoredFocusRegion {
    pub fn new(sensor: SensorSize, region: &SensorFocusRegion) -> Self {
        Self {
            sensor_width: sensor.width,
            sensor_height: sensor.height,
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
        }
    }

    /// Whether this region was recorded under the given sensor resolution
    pub fn matches_sensor(&self, sensor: SensorSize) -> bool {
        self.sensor_width == sensor.width && self.sensor_height == sensor.height
    }

    /// Rebuild the metering region with the given weight
    pub fn to_region(&self, weight: i32) -> SensorFocusRegion {
        SensorFocusRegion {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            weight,
        }
    }
}

impl fmt::Display for StoredFocusRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Textual layout is an interop contract with existing stored values
        write!(
            f,
            "Res:{}/{} Pos:{},{},{},{}",
            self.sensor_width, self.sensor_height, self.x, self.y, self.width, self.height
        )
    }
}

impl FromStr for StoredFocusRegion {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || RegionError::Malformed {
            value: s.to_string(),
        };

        let rest = s.strip_prefix("Res:").ok_or_else(malformed)?;
        let (resolution, position) = rest.split_once(" Pos:").ok_or_else(malformed)?;

        let (sensor_width, sensor_height) = resolution.split_once('/').ok_or_else(malformed)?;
        let sensor_width = sensor_width.parse().map_err(|_| malformed())?;
        let sensor_height = sensor_height.parse().map_err(|_| malformed())?;

        let mut fields = position.split(',');
        let mut next = || -> Result<i32, RegionError> {
            fields
                .next()
                .ok_or_else(malformed)?
                .parse()
                .map_err(|_| malformed())
        };
        let x = next()?;
        let y = next()?;
        let width = next()?;
        let height = next()?;
        if fields.next().is_some() {
            return Err(malformed());
        }

        Ok(Self {
            sensor_width,
            sensor_height,
            x,
            y,
            width,
            height,
        })
    }
}

/// Persists and restores the last manually chosen metering region through
/// the settings collaborator
pub struct FocusRegionStore {
    settings: Arc<dyn SettingsStore>,
}

impl FocusRegionStore {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    /// Active focus mode from the settings
    pub fn focus_mode(&self) -> FocusMode {
        self.settings
            .get_string(keys::AF_MODE)
            .map(|v| FocusMode::from_pref(&v))
            .unwrap_or_default()
    }

    /// Persist the region, tagged with the sensor resolution it was
    /// computed under. Only manual-field mode keeps a stored region.
    pub fn store(&self, sensor: SensorSize, region: &SensorFocusRegion) {
        if self.focus_mode() != FocusMode::ManualField {
            return;
        }

        let stored = StoredFocusRegion::new(sensor, region);
        self.settings.put_string(keys::AF_FIELD, &stored.to_string());
        debug!("Stored focus region {}", stored);
    }

    /// Restore the stored region if it exists, parses, and was recorded
    /// under the current sensor resolution. Stale or malformed values are
    /// treated as absent; the stored value is left in place.
    pub fn load(&self, sensor: SensorSize) -> Option<StoredFocusRegion> {
        let raw = self.settings.get_string(keys::AF_FIELD)?;

        let stored = match raw.parse::<StoredFocusRegion>() {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Ignoring stored focus region: {}", e);
                return None;
            }
        };

        if !stored.matches_sensor(sensor) {
            warn!(
                "Ignoring stored focus region: {}",
                RegionError::StaleResolution {
                    stored_width: stored.sensor_width,
                    stored_height: stored.sensor_height,
                    current_width: sensor.width,
                    current_height: sensor.height,
                }
            );
            return None;
        }

        Some(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettings;

    fn region(x: i32, y: i32) -> SensorFocusRegion {
        SensorFocusRegion {
            x,
            y,
            width: 100,
            height: 100,
            weight: 999,
        }
    }

    #[test]
    fn test_encoding_round_trips_byte_for_byte() {
        let encoded = "Res:4000/3000 Pos:750,2350,100,100";
        let stored: StoredFocusRegion = encoded.parse().unwrap();

        assert_eq!(stored.sensor_width, 4000);
        assert_eq!(stored.sensor_height, 3000);
        assert_eq!(stored.x, 750);
        assert_eq!(stored.y, 2350);
        assert_eq!(stored.to_string(), encoded);
    }

    #[test]
    fn test_malformed_values_fail_to_parse() {
        for value in [
            "",
            "Res:4000/3000",
            "Res:4000 Pos:1,2,3,4",
            "Res:4000/3000 Pos:1,2,3",
            "Res:4000/3000 Pos:1,2,3,4,5",
            "Res:a/3000 Pos:1,2,3,4",
            "Pos:1,2,3,4 Res:4000/3000",
        ] {
            assert!(
                value.parse::<StoredFocusRegion>().is_err(),
                "expected parse failure for {:?}",
                value
            );
        }
    }

    #[test]
    fn test_store_is_skipped_in_auto_mode() {
        let settings = Arc::new(MemorySettings::new());
        let store = FocusRegionStore::new(settings.clone());

        store.store(SensorSize::new(4000, 3000), &region(750, 2350));
        assert_eq!(settings.get_string(keys::AF_FIELD), None);
    }

    #[test]
    fn test_store_and_load_in_manual_field_mode() {
        let settings = Arc::new(MemorySettings::new());
        settings.put_string(keys::AF_MODE, "field");
        let store = FocusRegionStore::new(settings.clone());

        let sensor = SensorSize::new(4000, 3000);
        store.store(sensor, &region(750, 2350));
        assert_eq!(
            settings.get_string(keys::AF_FIELD).as_deref(),
            Some("Res:4000/3000 Pos:750,2350,100,100")
        );

        let restored = store.load(sensor).unwrap();
        assert_eq!(restored.to_region(999), region(750, 2350));
    }

    #[test]
    fn test_resolution_mismatch_is_stale_and_left_in_place() {
        let settings = Arc::new(MemorySettings::new());
        settings.put_string(keys::AF_MODE, "field");
        settings.put_string(keys::AF_FIELD, "Res:4000/3000 Pos:750,2350,100,100");
        let store = FocusRegionStore::new(settings.clone());

        assert!(store.load(SensorSize::new(1920, 1080)).is_none());

        // The stale value is not cleared
        assert_eq!(
            settings.get_string(keys::AF_FIELD).as_deref(),
            Some("Res:4000/3000 Pos:750,2350,100,100")
        );
    }

    #[test]
    fn test_malformed_stored_value_is_treated_as_absent() {
        let settings = Arc::new(MemorySettings::new());
        settings.put_string(keys::AF_FIELD, "garbage");
        let store = FocusRegionStore::new(settings);

        assert!(store.load(SensorSize::new(4000, 3000)).is_none());
    }

    #[test]
    fn test_focus_mode_defaults_to_auto() {
        let settings = Arc::new(MemorySettings::new());
        let store = FocusRegionStore::new(settings.clone());
        assert_eq!(store.focus_mode(), FocusMode::Auto);

        settings.put_string(keys::AF_MODE, "field");
        assert_eq!(store.focus_mode(), FocusMode::ManualField);

        settings.put_string(keys::AF_MODE, "bogus");
        assert_eq!(store.focus_mode(), FocusMode::Auto);
    }
}
