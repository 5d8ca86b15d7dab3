//! Host control adapter.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;

use crate::app::ports::SystemControl;

/// Restart request latch.
///
/// The binary shares the flag with the scheduler as its shutdown signal:
/// raising it stops every loop, after which the process exits with a
/// status its supervisor treats as "restart me".
#[derive(Clone, Default)]
pub struct RestartLatch {
    flag: Arc<AtomicBool>,
}

impl RestartLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared flag to hand to [`scheduler::run`](crate::scheduler::run).
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    pub fn requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

impl SystemControl for RestartLatch {
    fn request_restart(&self) {
        warn!("[system] restart requested");
        self.flag.store(true, Ordering::Release);
    }
}
