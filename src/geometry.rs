//! Coordinate transforms between view space, scaled preview space and
//! sensor pixel space. Pure functions, no external state.

use serde::{Deserialize, Serialize};

/// Maximum metering weight understood by capture sessions
pub const METERING_WEIGHT_MAX: i32 = 1000;

/// A single finger-down position in view pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub x: f32,
    pub y: f32,
}

impl TouchPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Ratio between the displayed preview's native content size and the view
/// bounds it is rendered into (the letterboxing factor)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewScale {
    pub scale_x: f32,
    pub scale_y: f32,
}

impl PreviewScale {
    pub fn new(scale_x: f32, scale_y: f32) -> Self {
        Self { scale_x, scale_y }
    }

    /// Scaling for a preview that fills the view exactly
    pub fn fill() -> Self {
        Self::new(1.0, 1.0)
    }
}

/// Image-relative touch position with letterbox padding removed,
/// both axes in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedFocusPoint {
    pub rel_x: f32,
    pub rel_y: f32,
}

/// Active sensor array dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorSize {
    pub width: i32,
    pub height: i32,
}

impl SensorSize {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

/// Metering rectangle in sensor pixel coordinates, plus the weight telling
/// the camera how strongly to favor it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorFocusRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub weight: i32,
}

/// Map a touch in view coordinates to an image-relative position.
///
/// The visible image rectangle is the view scaled by the preview scaling
/// factors and centered; a touch landing in the letterbox padding outside
/// that rectangle yields `None`.
pub fn to_normalized(
    touch: TouchPoint,
    view_width: u32,
    view_height: u32,
    scale: PreviewScale,
) -> Option<NormalizedFocusPoint> {
    let vw = view_width as f32;
    let vh = view_height as f32;
    let iw = vw * scale.scale_x;
    let ih = vh * scale.scale_y;
    if iw <= 0.0 || ih <= 0.0 {
        return None;
    }

    let left = (vw - iw) / 2.0;
    let top = (vh - ih) / 2.0;
    if touch.x < left || touch.x > left + iw || touch.y < top || touch.y > top + ih {
        return None;
    }

    Some(NormalizedFocusPoint {
        rel_x: (touch.x - left) / iw,
        rel_y: (touch.y - top) / ih,
    })
}

/// Project an image-relative position onto the sensor as a metering region.
///
/// The sensor is mounted rotated 90 degrees relative to the reported
/// preview orientation, so X and Y are swapped: sensor Y derives from the
/// relative X, sensor X from the relative Y. Origin coordinates are
/// clamped to zero; width and height pass through unclamped.
pub fn to_sensor_region(
    point: NormalizedFocusPoint,
    sensor: SensorSize,
    field_width: i32,
    field_height: i32,
    weight: i32,
) -> SensorFocusRegion {
    let y = (point.rel_x * sensor.height as f32) as i32 - field_height / 2;
    let x = (point.rel_y * sensor.width as f32) as i32 - field_width / 2;

    SensorFocusRegion {
        x: x.max(0),
        y: y.max(0),
        width: field_width,
        height: field_height,
        weight,
    }
}
