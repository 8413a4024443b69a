//! Single-slot lifecycle callbacks

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use gwsim_core::LifecycleCallback;
use parking_lot::RwLock;
use tracing::{debug, warn};

/// Connected/disconnected callback slots; registering replaces
#[derive(Default)]
pub(crate) struct CallbackSlots {
    connected: RwLock<Option<LifecycleCallback>>,
    disconnected: RwLock<Option<LifecycleCallback>>,
}

impl CallbackSlots {
    pub fn set_connected(&self, callback: LifecycleCallback) {
        if self.connected.write().replace(callback).is_some() {
            debug!("Replaced connected callback");
        }
    }

    pub fn set_disconnected(&self, callback: LifecycleCallback) {
        if self.disconnected.write().replace(callback).is_some() {
            debug!("Replaced disconnected callback");
        }
    }

    pub async fn fire_connected(&self) {
        let callback = self.connected.read().clone();
        fire(callback, "connected").await;
    }

    pub async fn fire_disconnected(&self) {
        let callback = self.disconnected.read().clone();
        fire(callback, "disconnected").await;
    }
}

async fn fire(callback: Option<LifecycleCallback>, event: &str) {
    let Some(callback) = callback else {
        debug!(event, "No callback registered");
        return;
    };
    if AssertUnwindSafe(callback()).catch_unwind().await.is_err() {
        warn!(event, "Lifecycle callback panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gwsim_core::lifecycle_callback;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_replacing_callback() {
        let slots = CallbackSlots::default();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        slots.set_connected(lifecycle_callback(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));
        let counter = second.clone();
        slots.set_connected(lifecycle_callback(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        slots.fire_connected().await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_slot_and_panic_are_harmless() {
        let slots = CallbackSlots::default();
        slots.fire_disconnected().await;

        slots.set_disconnected(lifecycle_callback(|| async {
            if true {
                panic!("callback exploded");
            }
        }));
        slots.fire_disconnected().await;
    }
}
