use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag for one run.
///
/// Clones share the same flag, so a controller keeps one clone and hands the
/// other to the engine. Cancelling is idempotent. The engine only reads it at
/// iteration boundaries; a request already in flight always completes.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancelled: Arc<AtomicBool>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_and_idempotent() {
        let control = RunControl::new();
        let handle = control.clone();
        assert!(!control.is_cancelled());

        handle.cancel();
        handle.cancel();
        assert!(control.is_cancelled());
    }
}
