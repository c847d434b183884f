use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

pub const ESC_KEY: u8 = 27;
pub const QUIT_KEY: u8 = b'q';

pub fn is_exit_key(byte: u8) -> bool {
    byte == ESC_KEY || byte == QUIT_KEY
}

/// Watches the terminal for an exit key on a background reader thread.
///
/// The terminal is line-buffered, so the key takes effect after Enter.
#[derive(Clone)]
pub struct ExitKeys {
    pressed: Arc<AtomicBool>,
}

impl ExitKeys {
    pub fn spawn() -> Self {
        let keys = Self::detached();
        let pressed = keys.pressed.clone();

        let spawned = thread::Builder::new()
            .name("exit-keys".to_string())
            .spawn(move || {
                for byte in io::stdin().lock().bytes() {
                    match byte {
                        Ok(b) if is_exit_key(b) => {
                            pressed.store(true, Ordering::SeqCst);
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::debug!("Stopped reading exit keys: {}", e);
                            break;
                        }
                    }
                }
            });
        if let Err(e) = spawned {
            tracing::warn!("Failed to start exit key reader: {}", e);
        }

        keys
    }

    /// Key state without a reader thread; set through [`ExitKeys::press`]
    pub fn detached() -> Self {
        Self {
            pressed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn press(&self) {
        self.pressed.store(true, Ordering::SeqCst);
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed.load(Ordering::SeqCst)
    }
}
