//! Search-as-you-type debouncing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lets a search term through only after `delay` passes without a newer one.
#[derive(Debug)]
pub struct SearchDebouncer {
    delay: Duration,
    latest: AtomicU64,
}

impl SearchDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            latest: AtomicU64::new(0),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait out the quiescence period. Returns the term if no newer term
    /// arrived meanwhile, `None` if it was superseded.
    pub async fn settle(&self, term: impl Into<String>) -> Option<String> {
        let term = term.into();
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::time::sleep(self.delay).await;

        (self.latest.load(Ordering::SeqCst) == ticket).then_some(term)
    }
}

impl Default for SearchDebouncer {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}
