// src/core/cancel.rs
//
// Cooperative cancellation shared by every long-running stage.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{ForensicError, Result};

/// Cancellation signal checked between frame batches
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that trips on its own once `timeout` has elapsed
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::Relaxed) {
            return true;
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.flag.store(true, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }

    /// Err(Cancelled) once the token has tripped
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ForensicError::Cancelled)
        } else {
            Ok(())
        }
    }
}
