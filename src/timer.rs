use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

const ARMED: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// One-shot delayed escalation for a single conversation.
///
/// Firing and cancelling race on a single compare-exchange: cancel only wins
/// while the timer is still armed, and once the fire callback has claimed the
/// timer it runs to completion.
#[derive(Debug)]
pub struct EscalationTimer {
    generation: u64,
    claim: Arc<AtomicU8>,
    handle: JoinHandle<()>,
}

impl EscalationTimer {
    pub fn schedule<F, Fut>(generation: u64, delay: Duration, on_fire: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let claim = Arc::new(AtomicU8::new(ARMED));
        let task_claim = Arc::clone(&claim);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if task_claim
                .compare_exchange(ARMED, FIRED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                on_fire().await;
            }
        });

        Self {
            generation,
            claim,
            handle,
        }
    }

    /// Returns `false` if the timer had already fired or been cancelled.
    pub fn cancel(&self) -> bool {
        let cancelled = self
            .claim
            .compare_exchange(ARMED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if cancelled {
            // The task is at most sleeping, so aborting cannot cut a fire short.
            self.handle.abort();
        }
        cancelled
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[cfg(test)]
    pub fn has_fired(&self) -> bool {
        self.claim.load(Ordering::Acquire) == FIRED
    }
}
