//! Cooperative cancellation, shared between the orchestrator's chunk loop
//! and the CLI's Ctrl-C handler (design §4.6, "the current chunk finishes
//! or fails before the process exits; a second signal forces immediate
//! exit").

use tokio_util::sync::CancellationToken;

/// A single `CancellationToken`, cloned into every task that needs to
/// observe a shutdown request. Cloning is cheap (an `Arc` internally); a
/// cancellation triggered on any clone is visible to all of them.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Requests cancellation. Idempotent: a second call is a no-op.
    pub fn request(&self) {
        self.token.cancel();
    }

    /// True once `request` has been called on this signal or any of its
    /// clones.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation has been requested. Intended for
    /// `tokio::select!` alongside the unit of work being cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn a_clone_observes_cancellation_requested_on_the_original() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_requested());
        signal.request();
        assert!(clone.is_requested());
        clone.cancelled().await;
    }

    #[test]
    fn request_is_idempotent() {
        let signal = ShutdownSignal::new();
        signal.request();
        signal.request();
        assert!(signal.is_requested());
    }
}
