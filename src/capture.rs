use crate::device::{
    image_channel, AcquiredImage, CaptureDevice, ControlMode, ControlValue, ImageRequestBuilder,
    ImageRequestSpec, ImageSize, RequestTemplate,
};
use crate::error::{CaptureError, ErrorSink, StillcamError};
use crate::notifier::{ImageTakenListener, ImageTakenNotifier};
use crate::orientation::{OrientationPolicy, OrientationSource};
use crate::persist::ImageStore;
use crate::settings::{keys, SettingsStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// How many frames one capture trigger produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaptureStrategy {
    /// One request, one image
    SingleShot,
    /// A fixed number of back-to-back capture cycles
    Burst { count: u32 },
}

impl Default for CaptureStrategy {
    fn default() -> Self {
        Self::SingleShot
    }
}

impl CaptureStrategy {
    /// Number of capture cycles one trigger runs
    pub fn frame_count(&self) -> u32 {
        match self {
            Self::SingleShot => 1,
            Self::Burst { count } => (*count).max(1),
        }
    }
}

/// Supplies the target size and domain tuning of a capture request
pub trait RequestConfigurator: Send + Sync {
    /// Target image size for the next capture
    fn target_size(&self) -> ImageSize;

    /// Apply scene and control tuning onto the request builder
    fn configure(&self, builder: &mut ImageRequestBuilder);
}

/// Configurator backed by the settings store, with fixed fallbacks for
/// values no preference overrides
pub struct SettingsRequestConfigurator {
    settings: Arc<dyn SettingsStore>,
    fallback: ImageSize,
}

impl SettingsRequestConfigurator {
    pub fn new(settings: Arc<dyn SettingsStore>, fallback: ImageSize) -> Self {
        Self { settings, fallback }
    }
}

impl RequestConfigurator for SettingsRequestConfigurator {
    fn target_size(&self) -> ImageSize {
        let width = self
            .settings
            .get_int(keys::CAPTURE_WIDTH)
            .filter(|w| *w > 0)
            .map(|w| w as u32)
            .unwrap_or(self.fallback.width);
        let height = self
            .settings
            .get_int(keys::CAPTURE_HEIGHT)
            .filter(|h| *h > 0)
            .map(|h| h as u32)
            .unwrap_or(self.fallback.height);
        ImageSize::new(width, height)
    }

    fn configure(&self, builder: &mut ImageRequestBuilder) {
        if let Some(iso) = self.settings.get_int(keys::ISO) {
            builder.set_control("sensor_sensitivity", ControlValue::Int(iso as i64));
        }
        if let Some(exposure) = self.settings.get_int(keys::EXPOSURE) {
            builder.set_control("exposure_compensation", ControlValue::Int(exposure as i64));
        }
        if let Some(wb) = self.settings.get_string(keys::WHITE_BALANCE) {
            builder.set_control("white_balance", ControlValue::Text(wb));
        }
    }
}

/// Builds and submits still-capture requests, receives the produced image
/// asynchronously, and hands the bytes to the persistence collaborator.
///
/// `capture()` returns immediately after submission; image delivery,
/// extraction and persistence run on a background task. No failure on
/// that path escapes to the caller.
pub struct CaptureOrchestrator {
    /// Correlation id across the asynchronous boundary, for diagnostics
    id: Uuid,
    device: Arc<dyn CaptureDevice>,
    configurator: Arc<dyn RequestConfigurator>,
    orientation: Arc<dyn OrientationSource>,
    store: Arc<dyn ImageStore>,
    settings: Arc<dyn SettingsStore>,
    error_sink: Arc<dyn ErrorSink>,
    notifier: Arc<ImageTakenNotifier>,
    strategy: CaptureStrategy,
}

impl CaptureOrchestrator {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        configurator: Arc<dyn RequestConfigurator>,
        orientation: Arc<dyn OrientationSource>,
        store: Arc<dyn ImageStore>,
        settings: Arc<dyn SettingsStore>,
        error_sink: Arc<dyn ErrorSink>,
    ) -> Self {
        let id = Uuid::new_v4();
        debug!("New capture orchestrator {}", id);
        Self {
            id,
            device,
            configurator,
            orientation,
            store,
            settings,
            error_sink,
            notifier: Arc::new(ImageTakenNotifier::new()),
            strategy: CaptureStrategy::default(),
        }
    }

    /// Select how many frames one trigger produces
    pub fn with_strategy(mut self, strategy: CaptureStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Correlation id of this orchestrator
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn add_image_taken_listener(&self, listener: Arc<dyn ImageTakenListener>) {
        self.notifier.add(listener);
    }

    pub fn remove_image_taken_listener(&self, listener: &Arc<dyn ImageTakenListener>) {
        self.notifier.remove(listener);
    }

    /// Trigger a capture.
    ///
    /// When the camera is not open the capture is skipped with a warning;
    /// nothing is submitted and no error is raised. Submission failures
    /// are reported to the error sink and likewise never propagate.
    pub async fn capture(&self) {
        debug!("Take picture {}", self.id);

        if !self.device.is_open() {
            warn!("Cannot take image, camera not open (yet)");
            return;
        }

        for frame in 0..self.strategy.frame_count() {
            if let Err(e) = self.submit_frame(frame).await {
                let cause = StillcamError::from(e);
                self.error_sink.error("Failed to create picture", &cause);
            }
        }
    }

    /// Build one request, submit it, and spawn the task that waits for
    /// the produced image
    async fn submit_frame(&self, frame: u32) -> Result<(), CaptureError> {
        let spec = self.build_request();
        let (target, reader) = image_channel();

        debug!("Submitting capture request {} frame {}", self.id, frame);
        self.device.submit_still(&spec, target).await?;

        let id = self.id;
        let extension = spec.format.extension();
        let store = Arc::clone(&self.store);
        let notifier = Arc::clone(&self.notifier);
        let error_sink = Arc::clone(&self.error_sink);

        tokio::spawn(async move {
            match reader.acquire().await {
                Some(image) => {
                    Self::on_image_ready(id, image, extension, &*store, &notifier, &*error_sink);
                }
                None => {
                    // Device torn down before delivering; fail safely
                    warn!("Capture {} produced no image", id);
                    let cause = StillcamError::from(CaptureError::NoImage);
                    error_sink.error("Error saving image", &cause);
                }
            }
        });

        Ok(())
    }

    /// Build the immutable request spec. A screen-derived orientation is
    /// snapshotted here; later rotation changes do not affect the
    /// in-flight request.
    fn build_request(&self) -> ImageRequestSpec {
        let size = self.configurator.target_size();
        let mut builder = ImageRequestBuilder::new(RequestTemplate::StillCapture, size);
        builder.control_mode(ControlMode::Auto);

        let policy = self
            .settings
            .get_string(keys::JPEG_ORIENTATION)
            .map(|v| OrientationPolicy::from_pref(&v))
            .unwrap_or_default();
        builder.orientation_degrees(policy.resolve(self.orientation.as_ref()));

        self.configurator.configure(&mut builder);
        builder.build()
    }

    /// Handle the image produced by a submitted request.
    ///
    /// The acquired image is dropped on every exit path of this scope.
    /// Failures are reported to the error sink exactly once and
    /// short-circuit the completion notification.
    fn on_image_ready(
        id: Uuid,
        image: AcquiredImage,
        extension: &str,
        store: &dyn ImageStore,
        notifier: &ImageTakenNotifier,
        error_sink: &dyn ErrorSink,
    ) {
        debug!("Store image {}", id);

        match Self::persist_image(&image, extension, store) {
            Ok(name) => {
                drop(image);
                debug!("Picture {} stored as \u{ab}{}\u{bb}", id, name);
                notifier.fire_completed();
            }
            Err(e) => {
                drop(image);
                let cause = StillcamError::from(e);
                error_sink.error("Error saving image", &cause);
            }
        }
    }

    /// Extract the first plane and write it through a scoped output. The
    /// output is released when this function returns, on success and on
    /// failure alike.
    fn persist_image(
        image: &AcquiredImage,
        extension: &str,
        store: &dyn ImageStore,
    ) -> Result<String, CaptureError> {
        let bytes = image.first_plane_bytes()?;
        let mut output = store.open_output(extension)?;
        output.write(&bytes)?;
        Ok(output.name().to_string())
    }
}
