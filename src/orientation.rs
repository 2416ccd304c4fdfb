use serde::{Deserialize, Serialize};

/// How the orientation field of a capture request is chosen.
///
/// The serialized names are the preference values written by existing
/// installations and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrientationPolicy {
    /// Leave the request without an orientation field
    #[serde(rename = "NO_ORIENTATION")]
    NoOrientation,
    /// Fixed portrait, 90 degrees
    #[serde(rename = "PORTRAIT")]
    Portrait,
    /// Fixed upside-down portrait, 270 degrees
    #[serde(rename = "PORTRAIT_FLIPPED")]
    PortraitFlipped,
    /// Fixed landscape, 0 degrees
    #[serde(rename = "LANDSCAPE_LEFT")]
    LandscapeLeft,
    /// Fixed reverse landscape, 180 degrees
    #[serde(rename = "LANDSCAPE_RIGHT")]
    LandscapeRight,
    /// Derive the rotation from the device's physical orientation at
    /// request-build time
    #[serde(rename = "SCREEN_ORIENTATION")]
    ScreenDerived,
}

impl Default for OrientationPolicy {
    fn default() -> Self {
        Self::ScreenDerived
    }
}

impl OrientationPolicy {
    /// Parse the stored preference value. Unknown values fall back to
    /// screen-derived, matching the default of older installations.
    pub fn from_pref(value: &str) -> Self {
        match value {
            "NO_ORIENTATION" => Self::NoOrientation,
            "PORTRAIT" => Self::Portrait,
            "PORTRAIT_FLIPPED" => Self::PortraitFlipped,
            "LANDSCAPE_LEFT" => Self::LandscapeLeft,
            "LANDSCAPE_RIGHT" => Self::LandscapeRight,
            _ => Self::ScreenDerived,
        }
    }

    /// Preference value this policy is stored under
    pub fn pref_value(&self) -> &'static str {
        match self {
            Self::NoOrientation => "NO_ORIENTATION",
            Self::Portrait => "PORTRAIT",
            Self::PortraitFlipped => "PORTRAIT_FLIPPED",
            Self::LandscapeLeft => "LANDSCAPE_LEFT",
            Self::LandscapeRight => "LANDSCAPE_RIGHT",
            Self::ScreenDerived => "SCREEN_ORIENTATION",
        }
    }

    /// Resolve the policy to the orientation degrees of a request built
    /// right now. A screen-derived policy snapshots the source at this
    /// instant only; later rotation changes do not affect the request.
    pub fn resolve(&self, source: &dyn OrientationSource) -> Option<u16> {
        match self {
            Self::NoOrientation => None,
            Self::Portrait => Some(90),
            Self::PortraitFlipped => Some(270),
            Self::LandscapeLeft => Some(0),
            Self::LandscapeRight => Some(180),
            Self::ScreenDerived => Some(source.rotation_degrees()),
        }
    }
}

/// Reports the device's current physical rotation
pub trait OrientationSource: Send + Sync {
    /// Current rotation in degrees (0, 90, 180 or 270)
    fn rotation_degrees(&self) -> u16;
}

/// Orientation source with a fixed rotation, for tests and headless use
#[derive(Debug, Clone, Copy)]
pub struct FixedOrientation(pub u16);

impl OrientationSource for FixedOrientation {
    fn rotation_degrees(&self) -> u16 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        degrees: u16,
        calls: AtomicUsize,
    }

    impl OrientationSource for CountingSource {
        fn rotation_degrees(&self) -> u16 {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.degrees
        }
    }

    #[test]
    fn test_pref_value_round_trip() {
        for policy in [
            OrientationPolicy::NoOrientation,
            OrientationPolicy::Portrait,
            OrientationPolicy::PortraitFlipped,
            OrientationPolicy::LandscapeLeft,
            OrientationPolicy::LandscapeRight,
            OrientationPolicy::ScreenDerived,
        ] {
            assert_eq!(OrientationPolicy::from_pref(policy.pref_value()), policy);
        }
    }

    #[test]
    fn test_unknown_pref_falls_back_to_screen_derived() {
        assert_eq!(
            OrientationPolicy::from_pref("SIDEWAYS"),
            OrientationPolicy::ScreenDerived
        );
    }

    #[test]
    fn test_fixed_policies_never_query_the_source() {
        let source = CountingSource {
            degrees: 90,
            calls: AtomicUsize::new(0),
        };

        assert_eq!(OrientationPolicy::NoOrientation.resolve(&source), None);
        assert_eq!(OrientationPolicy::Portrait.resolve(&source), Some(90));
        assert_eq!(OrientationPolicy::PortraitFlipped.resolve(&source), Some(270));
        assert_eq!(OrientationPolicy::LandscapeLeft.resolve(&source), Some(0));
        assert_eq!(OrientationPolicy::LandscapeRight.resolve(&source), Some(180));
        assert_eq!(source.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_screen_derived_queries_the_source_once() {
        let source = CountingSource {
            degrees: 180,
            calls: AtomicUsize::new(0),
        };

        assert_eq!(OrientationPolicy::ScreenDerived.resolve(&source), Some(180));
        assert_eq!(source.calls.load(Ordering::Relaxed), 1);
    }
}
