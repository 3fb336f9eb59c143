use crate::runtime::{Delivery, Runtime};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Tells the managed owner, once, that the engine dropped the client.
pub struct ShutdownNotifier<R: Runtime> {
    runtime: Arc<R>,
    fired: AtomicBool,
}

impl<R: Runtime> ShutdownNotifier<R> {
    pub fn new(runtime: Arc<R>) -> Self {
        Self {
            runtime,
            fired: AtomicBool::new(false),
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Returns the delivery outcome, or `None` if this notifier already fired
    /// or the notifying thread could not be attached.
    pub fn notify(&self) -> Option<Delivery> {
        if self.fired.swap(true, Ordering::AcqRel) {
            return None;
        }
        match self.runtime.notify_shutdown() {
            Ok(Delivery::Delivered) => {
                info!("shutdown delivered to managed client");
                Some(Delivery::Delivered)
            }
            Ok(Delivery::OwnerReleased) => {
                debug!("managed client already released, shutdown dropped");
                Some(Delivery::OwnerReleased)
            }
            Err(e) => {
                warn!("cannot deliver shutdown: {e}");
                None
            }
        }
    }
}
