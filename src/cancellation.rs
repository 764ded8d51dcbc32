/*!
 * Cooperative cancellation token.
 *
 * Mirrors the `Arc`-wrapped shared-state pattern of a semaphore-style
 * concurrency limiter, in miniature: cheaply cloneable shared state behind
 * an `Arc`, checked cooperatively between units of work rather than
 * forcibly interrupting a thread.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::Error;

#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns `Err(Error::Cancelled)` if cancellation has been requested;
    /// call this between units of work in long-running loops.
    pub fn check(&self) -> Result<(), Error> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
