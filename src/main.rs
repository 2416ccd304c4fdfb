use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use stillcam::{
    CaptureOrchestrator, FocusController, ImageSize, ImageTakenListener, LogErrorSink,
    MemorySettings, MockCaptureDevice, FixedOrientation, PreviewScale, SensorSize,
    SettingsRequestConfigurator, StillcamConfig, TimestampedFileStore, TouchPoint,
};

#[derive(Parser, Debug)]
#[command(name = "stillcam")]
#[command(about = "Still-image capture and touch-to-focus coordination core")]
#[command(version)]
#[command(long_about = "Drives the stillcam capture and focus coordination core against an \
in-process mock camera: restores the last manual focus position, maps a touch into a sensor \
metering region, runs an autofocus lock cycle, and captures a still image into the configured \
image directory.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "stillcam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without capturing")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

struct PrintListener;

impl ImageTakenListener for PrintListener {
    fn take_image_finished(&self) {
        info!("Image taken notification received");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print!("{}", StillcamConfig::default_toml()?);
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting stillcam v{}", env!("CARGO_PKG_VERSION"));

    let config = if std::path::Path::new(&args.config).exists() {
        match StillcamConfig::load_from_file(&args.config) {
            Ok(config) => {
                info!("Configuration loaded from: {}", args.config);
                config
            }
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                return Err(e.into());
            }
        }
    } else {
        info!(
            "Configuration file {} not found, using defaults",
            args.config
        );
        StillcamConfig::default()
    };

    if args.validate_config {
        config.validate()?;
        info!("Configuration is valid");
        return Ok(());
    }

    run_demo_cycle(&config).await
}

/// Wire the default collaborators to the mock device and run one focus
/// and capture cycle
async fn run_demo_cycle(config: &StillcamConfig) -> Result<()> {
    let settings = Arc::new(MemorySettings::new());
    config.apply_to_settings(&*settings);

    let sensor = SensorSize::new(4000, 3000);
    let device = Arc::new(MockCaptureDevice::new(sensor));
    let store = Arc::new(TimestampedFileStore::new(&config.storage.path)?);
    let configurator = Arc::new(SettingsRequestConfigurator::new(
        settings.clone(),
        ImageSize::new(config.capture.width, config.capture.height),
    ));

    let orchestrator = CaptureOrchestrator::new(
        device.clone(),
        configurator,
        Arc::new(FixedOrientation(90)),
        store.clone(),
        settings.clone(),
        Arc::new(LogErrorSink),
    )
    .with_strategy(config.capture.strategy);
    orchestrator.add_image_taken_listener(Arc::new(PrintListener));

    let focus = FocusController::new(device.clone(), device.clone(), settings.clone());

    // Reissue the last persisted manual focus position, if any
    focus.restore_last_focus();

    // Simulate a finger-down near the center of a letterboxed preview
    let touch = TouchPoint::new(540.0, 960.0);
    let scale = PreviewScale::new(1.0, 0.75);
    if focus.on_touch(touch, 1080, 1920, scale) {
        info!("Touch accepted, focus lock cycle started");
    } else {
        warn!("Touch was ignored");
    }

    orchestrator.capture().await;

    // Give the background delivery tasks a moment to resolve
    tokio::time::sleep(Duration::from_millis(200)).await;

    info!(
        "Done: {} capture request(s) submitted, {} focus lock request(s) issued, images under {}",
        device.submitted().len(),
        device.lock_requests().len(),
        store.base_dir().display()
    );

    Ok(())
}

/// Initialize the tracing subscriber from command line flags
fn init_logging(args: &Args) -> Result<()> {
    let filter = if args.debug {
        "stillcam=debug"
    } else if args.verbose {
        "stillcam=info"
    } else if args.quiet {
        "stillcam=error"
    } else {
        "stillcam=warn"
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter);

    match args.log_format.as_deref() {
        Some("json") => subscriber.json().init(),
        Some("compact") => subscriber.compact().init(),
        Some("pretty") | None => subscriber.init(),
        Some(other) => {
            anyhow::bail!("Unknown log format: {}", other);
        }
    }

    Ok(())
}
