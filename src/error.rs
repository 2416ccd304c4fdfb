use thiserror::Error;

#[derive(Error, Debug)]
pub enum StillcamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Focus error: {0}")]
    Focus(#[from] FocusError),

    #[error("Focus region error: {0}")]
    Region(#[from] RegionError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl StillcamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while building, submitting or completing a still capture
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Request submission failed: {details}")]
    Submit { details: String },

    #[error("No image was delivered for the submitted request")]
    NoImage,

    #[error("Acquired image contains no plane data")]
    EmptyImage,

    #[error("Image delivery rejected: {details}")]
    Delivery { details: String },

    #[error("Failed to open image output: {details}")]
    OutputOpen { details: String },

    #[error("Failed to write image data: {0}")]
    OutputWrite(#[from] std::io::Error),
}

/// Errors raised by the autofocus lock path
#[derive(Error, Debug)]
pub enum FocusError {
    #[error("Autofocus is not supported by this device")]
    Unsupported,

    #[error("Focus lock request failed: {details}")]
    Lock { details: String },
}

/// Errors raised while parsing a persisted focus region
#[derive(Error, Debug)]
pub enum RegionError {
    #[error("Malformed stored focus region: {value}")]
    Malformed { value: String },

    #[error("Stored focus region was recorded under {stored_width}x{stored_height}, current sensor is {current_width}x{current_height}")]
    StaleResolution {
        stored_width: i32,
        stored_height: i32,
        current_width: i32,
        current_height: i32,
    },
}

pub type Result<T> = std::result::Result<T, StillcamError>;

/// Terminal sink for failures caught inside the capture and focus paths.
/// Implementations must never panic or re-raise.
pub trait ErrorSink: Send + Sync {
    fn error(&self, message: &str, cause: &StillcamError);
}

/// Error sink that reports through the tracing error level
#[derive(Debug, Default)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn error(&self, message: &str, cause: &StillcamError) {
        tracing::error!("{}: {}", message, cause);
    }
}
