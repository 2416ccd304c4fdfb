use crate::error::CaptureError;
use chrono::Local;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// A scoped image output. Dropping the output releases the underlying
/// resource, so it is closed on every exit path of the writing scope.
pub trait ImageOutput: Send {
    /// Write the complete image payload
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()>;

    /// Logical name of the stored image, for diagnostics
    fn name(&self) -> &str;
}

/// Persistence collaborator that allocates outputs for captured images
pub trait ImageStore: Send + Sync {
    /// Open a new output for an image with the given file extension
    fn open_output(&self, extension: &str) -> Result<Box<dyn ImageOutput>, CaptureError>;
}

/// File-backed store naming images by wall-clock timestamp and sequence
pub struct TimestampedFileStore {
    base_dir: PathBuf,
    sequence: AtomicU64,
}

impl TimestampedFileStore {
    /// Create a store rooted at `base_dir`, creating the directory if needed
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, CaptureError> {
        let base_dir = base_dir.into();
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir).map_err(|e| CaptureError::OutputOpen {
                details: format!("{}: {}", base_dir.display(), e),
            })?;
            info!("Created image directory: {}", base_dir.display());
        }

        Ok(Self {
            base_dir,
            sequence: AtomicU64::new(0),
        })
    }

    /// Directory images are stored under
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }
}

impl ImageStore for TimestampedFileStore {
    fn open_output(&self, extension: &str) -> Result<Box<dyn ImageOutput>, CaptureError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "img_{}_{:04}.{}",
            Local::now().format("%Y%m%d_%H%M%S"),
            sequence,
            extension
        );
        let path = self.base_dir.join(&name);

        let file = File::create(&path).map_err(|e| CaptureError::OutputOpen {
            details: format!("{}: {}", path.display(), e),
        })?;

        debug!("Opened image output {}", path.display());
        Ok(Box::new(FileImageOutput { name, file }))
    }
}

/// Image output writing to a single file
struct FileImageOutput {
    name: String,
    file: File,
}

impl ImageOutput for FileImageOutput {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.file.write_all(bytes)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
