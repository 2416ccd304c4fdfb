use crate::device::{CaptureDevice, FocusSession};
use crate::geometry::{
    self, PreviewScale, SensorFocusRegion, TouchPoint, METERING_WEIGHT_MAX,
};
use crate::notifier::ListenerRegistry;
use crate::region_store::{FocusMode, FocusRegionStore};
use crate::settings::{keys, SettingsStore};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default metering field edge length in sensor pixels
const DEFAULT_FIELD_SIZE: i32 = 100;

/// States of the autofocus lock cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusState {
    /// No lock cycle in flight; touches are accepted
    Idle,
    /// A lock request was issued and has not resolved yet
    Requested,
    /// The device locked focus; listeners are being notified
    Locked,
    /// The lock request failed; listeners are being notified
    Failed,
}

/// Terminal result of a focus lock cycle, delivered to listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusOutcome {
    Locked,
    Failed,
}

/// Notified when a focus lock cycle resolves
pub trait FocusChangeListener: Send + Sync {
    fn focus_changed(&self, outcome: FocusOutcome, region: SensorFocusRegion);
}

/// Maps touches on the preview into sensor metering regions and drives
/// the autofocus lock cycle against the capture session.
///
/// At most one lock cycle is in flight at a time. The state machine, not
/// a lock, enforces this; touches originate from a single input stream.
pub struct FocusController {
    device: Arc<dyn CaptureDevice>,
    session: Arc<dyn FocusSession>,
    settings: Arc<dyn SettingsStore>,
    region_store: FocusRegionStore,
    state: Arc<Mutex<FocusState>>,
    listeners: Arc<ListenerRegistry<dyn FocusChangeListener>>,
}

impl FocusController {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        session: Arc<dyn FocusSession>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            device,
            session,
            region_store: FocusRegionStore::new(Arc::clone(&settings)),
            settings,
            state: Arc::new(Mutex::new(FocusState::Idle)),
            listeners: Arc::new(ListenerRegistry::new()),
        }
    }

    /// Register a listener for lock cycle completion
    pub fn add_focus_change_listener(&self, listener: Arc<dyn FocusChangeListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_focus_change_listener(&self, listener: &Arc<dyn FocusChangeListener>) {
        self.listeners.remove(listener);
    }

    /// Current state of the lock cycle
    pub fn state(&self) -> FocusState {
        *self.state.lock()
    }

    /// Handle a finger-down event on the preview view.
    ///
    /// Returns `false` when the touch was ignored: autofocus unsupported,
    /// a lock cycle already in flight, or the touch outside the visible
    /// image rectangle. An ignored touch changes no state and writes no
    /// preference.
    pub fn on_touch(
        &self,
        touch: TouchPoint,
        view_width: u32,
        view_height: u32,
        scale: PreviewScale,
    ) -> bool {
        if !self.device.supports_autofocus() {
            debug!("Autofocus not supported, ignoring touch");
            return false;
        }

        if self.state() != FocusState::Idle {
            warn!("Manual focus already started");
            return false;
        }

        let point = match geometry::to_normalized(touch, view_width, view_height, scale) {
            Some(point) => point,
            None => {
                debug!("Touch outside the visible image area");
                return false;
            }
        };

        let sensor = self.device.sensor_size();
        let field_width = self
            .settings
            .get_int(keys::AF_FIELD_WIDTH)
            .unwrap_or(DEFAULT_FIELD_SIZE);
        let field_height = self
            .settings
            .get_int(keys::AF_FIELD_HEIGHT)
            .unwrap_or(DEFAULT_FIELD_SIZE);

        let region = geometry::to_sensor_region(
            point,
            sensor,
            field_width,
            field_height,
            METERING_WEIGHT_MAX - 1,
        );

        self.region_store.store(sensor, &region);
        self.issue_lock(region);
        true
    }

    /// Reissue the last persisted manual focus region, bypassing the
    /// touch mapping.
    ///
    /// No-op in auto mode, or when no usable region is stored, or while a
    /// lock cycle is in flight.
    pub fn restore_last_focus(&self) {
        if self.region_store.focus_mode() != FocusMode::ManualField {
            return;
        }

        let Some(stored) = self.region_store.load(self.device.sensor_size()) else {
            return;
        };

        if self.state() != FocusState::Idle {
            warn!("Focus cycle in flight, skipping focus restore");
            return;
        }

        debug!("Restoring last focus region {}", stored);
        self.issue_lock(stored.to_region(METERING_WEIGHT_MAX - 1));
    }

    /// Transition to `Requested` and resolve the lock cycle on a
    /// background task. Listeners are notified synchronously with the
    /// terminal transition; afterwards the state returns to idle so a new
    /// touch is always accepted once the cycle resolves.
    fn issue_lock(&self, region: SensorFocusRegion) {
        *self.state.lock() = FocusState::Requested;
        debug!("Focus lock requested at {:?}", region);

        let session = Arc::clone(&self.session);
        let state = Arc::clone(&self.state);
        let listeners = Arc::clone(&self.listeners);

        tokio::spawn(async move {
            let outcome = match session.lock_focus(region).await {
                Ok(()) => FocusOutcome::Locked,
                Err(e) => {
                    warn!("Focus lock failed: {}", e);
                    FocusOutcome::Failed
                }
            };

            *state.lock() = match outcome {
                FocusOutcome::Locked => FocusState::Locked,
                FocusOutcome::Failed => FocusState::Failed,
            };
            for listener in listeners.snapshot() {
                listener.focus_changed(outcome, region);
            }
            *state.lock() = FocusState::Idle;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MockCaptureDevice;
    use crate::error::FocusError;
    use crate::geometry::SensorSize;
    use crate::settings::MemorySettings;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Focus session that blocks until released, to hold the lock cycle
    /// in flight from the test
    struct GatedSession {
        release: Semaphore,
        fail: AtomicBool,
        calls: Mutex<Vec<SensorFocusRegion>>,
    }

    impl GatedSession {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                release: Semaphore::new(0),
                fail: AtomicBool::new(false),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<SensorFocusRegion> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl FocusSession for GatedSession {
        async fn lock_focus(&self, region: SensorFocusRegion) -> Result<(), FocusError> {
            self.calls.lock().push(region);
            self.release
                .acquire()
                .await
                .expect("semaphore closed")
                .forget();
            if self.fail.load(Ordering::SeqCst) {
                return Err(FocusError::Lock {
                    details: "gated failure".to_string(),
                });
            }
            Ok(())
        }
    }

    struct RecordingListener {
        locked: AtomicUsize,
        failed: AtomicUsize,
    }

    impl RecordingListener {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                locked: AtomicUsize::new(0),
                failed: AtomicUsize::new(0),
            })
        }
    }

    impl FocusChangeListener for RecordingListener {
        fn focus_changed(&self, outcome: FocusOutcome, _region: SensorFocusRegion) {
            match outcome {
                FocusOutcome::Locked => self.locked.fetch_add(1, Ordering::SeqCst),
                FocusOutcome::Failed => self.failed.fetch_add(1, Ordering::SeqCst),
            };
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached within timeout");
    }

    fn controller_with(
        session: Arc<GatedSession>,
        settings: Arc<MemorySettings>,
    ) -> (FocusController, Arc<MockCaptureDevice>) {
        let device = Arc::new(MockCaptureDevice::new(SensorSize::new(4000, 3000)));
        let controller = FocusController::new(device.clone(), session, settings);
        (controller, device)
    }

    fn center_touch() -> TouchPoint {
        TouchPoint::new(540.0, 960.0)
    }

    #[tokio::test]
    async fn test_touch_drives_a_full_lock_cycle() {
        let session = GatedSession::new();
        let settings = Arc::new(MemorySettings::new());
        let (controller, _device) = controller_with(session.clone(), settings);

        let listener = RecordingListener::new();
        controller.add_focus_change_listener(listener.clone());

        assert!(controller.on_touch(center_touch(), 1080, 1920, PreviewScale::fill()));
        assert_eq!(controller.state(), FocusState::Requested);
        wait_until(|| session.calls().len() == 1).await;

        session.release.add_permits(1);
        wait_until(|| controller.state() == FocusState::Idle).await;

        assert_eq!(listener.locked.load(Ordering::SeqCst), 1);
        assert_eq!(listener.failed.load(Ordering::SeqCst), 0);

        // Once the cycle resolved a new touch is accepted again
        assert!(controller.on_touch(center_touch(), 1080, 1920, PreviewScale::fill()));
        session.release.add_permits(1);
        wait_until(|| controller.state() == FocusState::Idle).await;
    }

    #[tokio::test]
    async fn test_second_touch_during_cycle_is_rejected() {
        let session = GatedSession::new();
        let settings = Arc::new(MemorySettings::new());
        let (controller, _device) = controller_with(session.clone(), settings);

        assert!(controller.on_touch(center_touch(), 1080, 1920, PreviewScale::fill()));
        assert!(!controller.on_touch(center_touch(), 1080, 1920, PreviewScale::fill()));
        wait_until(|| session.calls().len() == 1).await;

        // Only the first touch reached the session
        session.release.add_permits(2);
        wait_until(|| controller.state() == FocusState::Idle).await;
        assert_eq!(session.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_lock_reports_failure_and_recovers() {
        let session = GatedSession::new();
        session.fail.store(true, Ordering::SeqCst);
        let settings = Arc::new(MemorySettings::new());
        let (controller, _device) = controller_with(session.clone(), settings);

        let listener = RecordingListener::new();
        controller.add_focus_change_listener(listener.clone());

        assert!(controller.on_touch(center_touch(), 1080, 1920, PreviewScale::fill()));
        session.release.add_permits(1);
        wait_until(|| controller.state() == FocusState::Idle).await;

        assert_eq!(listener.locked.load(Ordering::SeqCst), 0);
        assert_eq!(listener.failed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_touch_without_autofocus_support_is_ignored() {
        let session = GatedSession::new();
        let settings = Arc::new(MemorySettings::new());
        let device = Arc::new(MockCaptureDevice::without_autofocus(SensorSize::new(
            4000, 3000,
        )));
        let controller = FocusController::new(device, session.clone(), settings);

        assert!(!controller.on_touch(center_touch(), 1080, 1920, PreviewScale::fill()));
        assert_eq!(controller.state(), FocusState::Idle);
        assert!(session.calls().is_empty());
    }

    #[tokio::test]
    async fn test_touch_outside_image_writes_nothing() {
        let session = GatedSession::new();
        let settings = Arc::new(MemorySettings::new());
        settings.put_string(keys::AF_MODE, "field");
        let (controller, _device) = controller_with(session.clone(), settings.clone());

        // Touch in the letterbox band above the visible image
        let scale = PreviewScale::new(1.0, 0.75);
        assert!(!controller.on_touch(TouchPoint::new(540.0, 100.0), 1080, 1920, scale));

        assert_eq!(controller.state(), FocusState::Idle);
        assert!(session.calls().is_empty());
        assert_eq!(settings.get_string(keys::AF_FIELD), None);
    }

    #[tokio::test]
    async fn test_touch_in_manual_mode_persists_the_region() {
        let session = GatedSession::new();
        let settings = Arc::new(MemorySettings::new());
        settings.put_string(keys::AF_MODE, "field");
        settings.put_int(keys::AF_FIELD_WIDTH, 200);
        settings.put_int(keys::AF_FIELD_HEIGHT, 200);
        let (controller, _device) = controller_with(session.clone(), settings.clone());

        assert!(controller.on_touch(center_touch(), 1080, 1920, PreviewScale::fill()));

        let stored = settings.get_string(keys::AF_FIELD).unwrap();
        assert!(stored.starts_with("Res:4000/3000 Pos:"));
        assert!(stored.ends_with(",200,200"));

        session.release.add_permits(1);
        wait_until(|| controller.state() == FocusState::Idle).await;
    }

    #[tokio::test]
    async fn test_restore_without_stored_region_is_a_no_op() {
        let session = GatedSession::new();
        let settings = Arc::new(MemorySettings::new());
        let (controller, _device) = controller_with(session.clone(), settings);

        // Auto mode, nothing stored
        controller.restore_last_focus();

        assert_eq!(controller.state(), FocusState::Idle);
        assert!(session.calls().is_empty());
    }

    #[tokio::test]
    async fn test_restore_reissues_the_stored_region() {
        let session = GatedSession::new();
        let settings = Arc::new(MemorySettings::new());
        settings.put_string(keys::AF_MODE, "field");
        settings.put_string(keys::AF_FIELD, "Res:4000/3000 Pos:750,2350,100,100");
        let (controller, _device) = controller_with(session.clone(), settings);

        controller.restore_last_focus();
        wait_until(|| session.calls().len() == 1).await;

        let region = session.calls()[0];
        assert_eq!(region.x, 750);
        assert_eq!(region.y, 2350);
        assert_eq!(region.weight, METERING_WEIGHT_MAX - 1);

        session.release.add_permits(1);
        wait_until(|| controller.state() == FocusState::Idle).await;
    }

    #[tokio::test]
    async fn test_restore_with_stale_resolution_is_a_no_op() {
        let session = GatedSession::new();
        let settings = Arc::new(MemorySettings::new());
        settings.put_string(keys::AF_MODE, "field");
        settings.put_string(keys::AF_FIELD, "Res:1920/1080 Pos:100,100,100,100");
        let (controller, _device) = controller_with(session.clone(), settings);

        controller.restore_last_focus();

        assert_eq!(controller.state(), FocusState::Idle);
        assert!(session.calls().is_empty());
    }
}
