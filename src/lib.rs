pub mod capture;
pub mod config;
pub mod device;
pub mod error;
pub mod focus;
pub mod geometry;
pub mod notifier;
pub mod orientation;
pub mod persist;
pub mod region_store;
pub mod settings;

pub use capture::{
    CaptureOrchestrator, CaptureStrategy, RequestConfigurator, SettingsRequestConfigurator,
};
pub use config::{CaptureConfig, FocusConfig, StillcamConfig, StorageConfig};
pub use device::{
    image_channel, AcquiredImage, CaptureDevice, ControlMode, ControlValue, FocusSession,
    ImageFormat, ImagePlane, ImageReader, ImageRequestBuilder, ImageRequestSpec, ImageSize,
    ImageTarget, MockCaptureDevice, RequestTemplate,
};
pub use error::{
    CaptureError, ErrorSink, FocusError, LogErrorSink, RegionError, Result, StillcamError,
};
pub use focus::{FocusChangeListener, FocusController, FocusOutcome, FocusState};
pub use geometry::{
    to_normalized, to_sensor_region, NormalizedFocusPoint, PreviewScale, SensorFocusRegion,
    SensorSize, TouchPoint, METERING_WEIGHT_MAX,
};
pub use notifier::{ImageTakenListener, ImageTakenNotifier, ListenerRegistry};
pub use orientation::{FixedOrientation, OrientationPolicy, OrientationSource};
pub use persist::{ImageOutput, ImageStore, TimestampedFileStore};
pub use region_store::{FocusMode, FocusRegionStore, StoredFocusRegion};
pub use settings::{MemorySettings, SettingsStore};
