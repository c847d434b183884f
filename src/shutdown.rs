//! Interrupt flag shared between the Ctrl+C handler and the frame loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

/// Cooperative stop request, checked once per loop iteration
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route Ctrl+C into this signal. Only the first call installs a handler.
    pub fn install_ctrlc(&self) {
        static CTRL_HANDLER: Once = Once::new();

        let requested = self.requested.clone();
        CTRL_HANDLER.call_once(move || {
            if let Err(err) = ctrlc::set_handler(move || {
                requested.store(true, Ordering::SeqCst);
            }) {
                tracing::warn!("Failed to install Ctrl+C handler: {err}");
            }
        });
    }

    pub fn trigger(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
