//! Process-wide shutdown flag shared by the supervisor and every session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    triggered: AtomicBool,
    notify: Notify,
}

/// Write-once shutdown flag.
///
/// Cloning shares the same flag. Once triggered it never resets; sessions
/// poll it at the top of each loop iteration and wake from their sleeps
/// through [`ShutdownSignal::sleep`].
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<Inner>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Returns `true` if this call flipped the flag.
    pub fn trigger(&self) -> bool {
        let flipped = !self.0.triggered.swap(true, Ordering::SeqCst);
        if flipped {
            self.0.notify.notify_waiters();
        }
        flipped
    }

    pub fn is_triggered(&self) -> bool {
        self.0.triggered.load(Ordering::SeqCst)
    }

    /// Resolves once shutdown has been requested.
    pub async fn triggered(&self) {
        loop {
            // Registered before the check so a concurrent trigger is not missed.
            let notified = self.0.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for `duration`, returning early on shutdown. Returns `false` if
    /// the sleep was cut short.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.triggered() => false,
        }
    }
}
