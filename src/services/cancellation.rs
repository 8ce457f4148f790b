//! Cooperative cancellation for upload drivers
//!
//! A [`CancelSignal`] is shared between the orchestrator, the driver task and the
//! transfer operation it invokes. Only a cancel request ever writes it; everyone
//! else polls it at their next suspension point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag used to stop an in-flight upload
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        CancelSignal(Arc::new(AtomicBool::new(false)))
    }

    /// Flip the flag. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called on any clone
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns true if both handles observe the same flag
    pub fn same_as(&self, other: &CancelSignal) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_signal_is_not_cancelled() {
        let signal = CancelSignal::new();
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn test_cancel_is_visible_through_clones() {
        let signal = CancelSignal::new();
        let clone = signal.clone();

        clone.cancel();

        assert!(signal.is_cancelled());
        assert!(signal.same_as(&clone));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let signal = CancelSignal::new();
        signal.cancel();
        signal.cancel();
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_from_another_task() {
        let signal = CancelSignal::new();
        let remote = signal.clone();
        tokio::spawn(async move { remote.cancel() }).await.unwrap();
        assert!(signal.is_cancelled());
    }

    #[test]
    fn test_independent_signals() {
        let a = CancelSignal::new();
        let b = CancelSignal::new();
        a.cancel();
        assert!(!b.is_cancelled());
        assert!(!a.same_as(&b));
    }
}
