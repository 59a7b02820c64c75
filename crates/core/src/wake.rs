//! Keep-awake resource shared by all sessions.
//!
//! The host display must stay on while any session is meant to be playing.
//! The lock is held while at least one session has `desired_playing` set and
//! released only when none has.

use std::sync::Arc;

/// Host-provided "keep the display awake" primitive.
pub trait WakeLock: Send + Sync {
    fn acquire(&self);
    fn release(&self);
}

/// Wake lock for hosts without one.
#[derive(Debug, Default)]
pub struct NoWakeLock;

impl WakeLock for NoWakeLock {
    fn acquire(&self) {}
    fn release(&self) {}
}

/// Reference-counted holder of a [`WakeLock`].
pub struct KeepAwake {
    lock: Arc<dyn WakeLock>,
    held: bool,
}

impl KeepAwake {
    pub fn new(lock: Arc<dyn WakeLock>) -> Self {
        Self { lock, held: false }
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Reconcile with the number of sessions that want to play.
    pub fn update(&mut self, playing: usize) {
        match (playing > 0, self.held) {
            (true, false) => {
                self.lock.acquire();
                self.held = true;
                tracing::debug!(playing, "wake lock acquired");
            }
            (false, true) => {
                self.lock.release();
                self.held = false;
                tracing::debug!("wake lock released");
            }
            _ => {}
        }
    }
}

impl Drop for KeepAwake {
    fn drop(&mut self) {
        self.update(0);
    }
}
