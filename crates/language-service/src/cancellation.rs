use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation signal threaded through every feature call.
///
/// Long traversals check it at each provider invocation and at each batch
/// iteration; a cancelled request produces "no result", never a partial
/// merge. Cancellation is not an error, and callers that need to tell "no
/// result" from "cancelled" check the token themselves.
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
