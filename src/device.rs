//! Abstract capture device and focus session seams, the request types
//! submitted through them, and the single-capacity image delivery channel.

use crate::error::{CaptureError, FocusError};
use crate::geometry::{SensorFocusRegion, SensorSize};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Request template understood by the capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTemplate {
    Preview,
    StillCapture,
}

/// Control-mode parameter of a capture request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlMode {
    /// Device-driven auto exposure, white balance and focus
    #[default]
    Auto,
    /// All automatic control disabled
    Off,
}

/// Output format requested from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    #[default]
    Jpeg,
}

impl ImageFormat {
    /// File extension used when persisting images of this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
        }
    }
}

/// A single scene or control tuning value
#[derive(Debug, Clone, PartialEq)]
pub enum ControlValue {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Image dimensions requested from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Builder for a still-capture request
#[derive(Debug, Clone)]
pub struct ImageRequestBuilder {
    template: RequestTemplate,
    size: ImageSize,
    format: ImageFormat,
    orientation_degrees: Option<u16>,
    control_mode: ControlMode,
    controls: BTreeMap<String, ControlValue>,
}

impl ImageRequestBuilder {
    pub fn new(template: RequestTemplate, size: ImageSize) -> Self {
        Self {
            template,
            size,
            format: ImageFormat::Jpeg,
            orientation_degrees: None,
            control_mode: ControlMode::Auto,
            controls: BTreeMap::new(),
        }
    }

    pub fn orientation_degrees(&mut self, degrees: Option<u16>) -> &mut Self {
        self.orientation_degrees = degrees;
        self
    }

    pub fn control_mode(&mut self, mode: ControlMode) -> &mut Self {
        self.control_mode = mode;
        self
    }

    /// Apply a scene or control tuning value onto the request
    pub fn set_control(&mut self, key: impl Into<String>, value: ControlValue) -> &mut Self {
        self.controls.insert(key.into(), value);
        self
    }

    /// Finish the builder. The produced spec has no mutating API and is
    /// immutable after submission.
    pub fn build(self) -> ImageRequestSpec {
        ImageRequestSpec {
            template: self.template,
            size: self.size,
            format: self.format,
            orientation_degrees: self.orientation_degrees,
            control_mode: self.control_mode,
            controls: self.controls,
        }
    }
}

/// A fully built, immutable still-capture request
#[derive(Debug, Clone)]
pub struct ImageRequestSpec {
    pub template: RequestTemplate,
    pub size: ImageSize,
    pub format: ImageFormat,
    pub orientation_degrees: Option<u16>,
    pub control_mode: ControlMode,
    controls: BTreeMap<String, ControlValue>,
}

impl ImageRequestSpec {
    /// Look up a tuning value applied to this request
    pub fn control(&self, key: &str) -> Option<&ControlValue> {
        self.controls.get(key)
    }

    /// Number of tuning values applied to this request
    pub fn control_count(&self) -> usize {
        self.controls.len()
    }
}

/// One plane of pixel data inside an acquired image
#[derive(Debug, Clone)]
pub struct ImagePlane {
    data: Vec<u8>,
}

impl ImagePlane {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Pixel data produced by the device for one capture.
///
/// The underlying buffer is released when this value is dropped, so
/// holding it inside a scope guarantees release on every exit path.
#[derive(Debug)]
pub struct AcquiredImage {
    planes: Vec<ImagePlane>,
}

impl AcquiredImage {
    pub fn new(planes: Vec<ImagePlane>) -> Self {
        Self { planes }
    }

    /// Copy the first plane's bytes into an owned buffer
    pub fn first_plane_bytes(&self) -> Result<Vec<u8>, CaptureError> {
        self.planes
            .first()
            .map(|plane| plane.bytes().to_vec())
            .ok_or(CaptureError::EmptyImage)
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }
}

/// Create a connected target/reader pair with capacity for a single
/// in-flight image. The bounded capacity enforces at-most-one-outstanding
/// backpressure at the source.
pub fn image_channel() -> (ImageTarget, ImageReader) {
    let (sender, receiver) = mpsc::channel(1);
    (ImageTarget { sender }, ImageReader { receiver })
}

/// Destination surface handed to the device when a request is submitted
#[derive(Clone)]
pub struct ImageTarget {
    sender: mpsc::Sender<AcquiredImage>,
}

impl ImageTarget {
    /// Deliver a produced image. Fails when the reader side is gone or an
    /// image is already pending.
    pub fn deliver(&self, image: AcquiredImage) -> Result<(), CaptureError> {
        self.sender
            .try_send(image)
            .map_err(|e| CaptureError::Delivery {
                details: match e {
                    mpsc::error::TrySendError::Full(_) => "an image is already pending".to_string(),
                    mpsc::error::TrySendError::Closed(_) => "reader side is gone".to_string(),
                },
            })
    }
}

/// Receiving side of the image channel; yields at most one image
pub struct ImageReader {
    receiver: mpsc::Receiver<AcquiredImage>,
}

impl ImageReader {
    /// Wait for the image produced by the submitted request. Returns
    /// `None` when the device tore down before delivering.
    pub async fn acquire(mut self) -> Option<AcquiredImage> {
        self.receiver.recv().await
    }
}

/// An open still-capture device handle.
///
/// Owned by the caller; the orchestrator never outlives it.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Whether the underlying camera handle is currently open
    fn is_open(&self) -> bool;

    /// Active sensor array dimensions
    fn sensor_size(&self) -> SensorSize;

    /// Whether the device supports autofocus at all
    fn supports_autofocus(&self) -> bool;

    /// Submit a still-capture request. The produced image arrives on
    /// `target` asynchronously; submission itself never blocks on it.
    async fn submit_still(
        &self,
        spec: &ImageRequestSpec,
        target: ImageTarget,
    ) -> Result<(), CaptureError>;
}

/// The negotiated session focus-lock requests are issued against
#[async_trait]
pub trait FocusSession: Send + Sync {
    /// Drive an autofocus lock cycle metering at `region`. Resolves once
    /// the device reports the lock result; an error is a failed lock, not
    /// a fault.
    async fn lock_focus(&self, region: SensorFocusRegion) -> Result<(), FocusError>;
}

/// In-process capture device for tests and headless use.
///
/// Records every submitted request and lock region, and synthesizes a
/// minimal JPEG byte pattern per capture.
pub struct MockCaptureDevice {
    open: AtomicBool,
    autofocus: bool,
    sensor: SensorSize,
    capture_counter: AtomicU64,
    fail_focus: AtomicBool,
    submitted: Mutex<Vec<ImageRequestSpec>>,
    lock_requests: Mutex<Vec<SensorFocusRegion>>,
}

impl MockCaptureDevice {
    pub fn new(sensor: SensorSize) -> Self {
        Self {
            open: AtomicBool::new(true),
            autofocus: true,
            sensor,
            capture_counter: AtomicU64::new(0),
            fail_focus: AtomicBool::new(false),
            submitted: Mutex::new(Vec::new()),
            lock_requests: Mutex::new(Vec::new()),
        }
    }

    /// Mock device reporting no autofocus capability
    pub fn without_autofocus(sensor: SensorSize) -> Self {
        Self {
            autofocus: false,
            ..Self::new(sensor)
        }
    }

    /// Open or close the simulated camera handle
    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::Relaxed);
    }

    /// Make subsequent lock requests fail
    pub fn set_fail_focus(&self, fail: bool) {
        self.fail_focus.store(fail, Ordering::Relaxed);
    }

    /// Requests submitted so far
    pub fn submitted(&self) -> Vec<ImageRequestSpec> {
        self.submitted.lock().clone()
    }

    /// Lock regions requested so far
    pub fn lock_requests(&self) -> Vec<SensorFocusRegion> {
        self.lock_requests.lock().clone()
    }

    /// Synthesize a minimal JPEG byte pattern, varied per capture
    fn mock_jpeg(&self, sequence: u64) -> Vec<u8> {
        let mut data = vec![
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01, 0x01, 0x01,
            0x00, 0x48, 0x00, 0x48, 0x00, 0x00,
        ];
        let pattern_size = 1000 + (sequence % 500) as usize;
        let pattern_byte = (sequence % 256) as u8;
        data.extend(vec![pattern_byte; pattern_size]);
        data.extend_from_slice(&[0xFF, 0xD9]);
        data
    }
}

#[async_trait]
impl CaptureDevice for MockCaptureDevice {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    fn sensor_size(&self) -> SensorSize {
        self.sensor
    }

    fn supports_autofocus(&self) -> bool {
        self.autofocus
    }

    async fn submit_still(
        &self,
        spec: &ImageRequestSpec,
        target: ImageTarget,
    ) -> Result<(), CaptureError> {
        if !self.is_open() {
            return Err(CaptureError::Submit {
                details: "device is closed".to_string(),
            });
        }

        self.submitted.lock().push(spec.clone());
        let sequence = self.capture_counter.fetch_add(1, Ordering::Relaxed);
        let data = self.mock_jpeg(sequence);

        trace!(
            "Mock capture {} produced {} bytes ({}x{})",
            sequence,
            data.len(),
            spec.size.width,
            spec.size.height
        );

        target.deliver(AcquiredImage::new(vec![ImagePlane::new(data)]))?;
        Ok(())
    }
}

#[async_trait]
impl FocusSession for MockCaptureDevice {
    async fn lock_focus(&self, region: SensorFocusRegion) -> Result<(), FocusError> {
        self.lock_requests.lock().push(region);

        if self.fail_focus.load(Ordering::Relaxed) {
            return Err(FocusError::Lock {
                details: "mock focus failure".to_string(),
            });
        }

        debug!("Mock focus locked at {:?}", region);
        Ok(())
    }
}
