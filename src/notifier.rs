use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

/// Listener registry guarded by a single lock.
///
/// Notification passes iterate a point-in-time snapshot taken with the
/// lock released, so concurrent add/remove from other threads neither
/// blocks nor mutates an in-flight pass.
pub struct ListenerRegistry<L: ?Sized> {
    listeners: Mutex<Vec<Arc<L>>>,
}

impl<L: ?Sized> ListenerRegistry<L> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Register a listener
    pub fn add(&self, listener: Arc<L>) {
        self.listeners.lock().push(listener);
    }

    /// Remove a previously registered listener. Identity is the
    /// allocation, not the value.
    pub fn remove(&self, listener: &Arc<L>) {
        self.listeners.lock().retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Point-in-time copy of the registered listeners
    pub fn snapshot(&self) -> Vec<Arc<L>> {
        self.listeners.lock().clone()
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }
}

impl<L: ?Sized> Default for ListenerRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}

/// Notified once per capture cycle whose image was stored
pub trait ImageTakenListener: Send + Sync {
    fn take_image_finished(&self);
}

/// Observer registry fired after a capture cycle completes
pub struct ImageTakenNotifier {
    listeners: ListenerRegistry<dyn ImageTakenListener>,
}

impl ImageTakenNotifier {
    pub fn new() -> Self {
        Self {
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn add(&self, listener: Arc<dyn ImageTakenListener>) {
        self.listeners.add(listener);
    }

    pub fn remove(&self, listener: &Arc<dyn ImageTakenListener>) {
        self.listeners.remove(listener);
    }

    /// Notify all listeners registered at this instant that an image was
    /// stored. Listeners added or removed while the pass runs do not
    /// affect it.
    pub fn fire_completed(&self) {
        let snapshot = self.listeners.snapshot();
        trace!("Notifying {} image taken listeners", snapshot.len());
        for listener in snapshot {
            listener.take_image_finished();
        }
    }
}

impl Default for ImageTakenNotifier {
    fn default() -> Self {
        Self::new()
    }
}
