//! Progress driven by a set of in-flight operations
//!
//! Every tracked operation bumps `initial` and `current`. When one settles,
//! successfully or not, the indicator moves to `(initial - current) / initial`;
//! when the last one settles both counters reset and the indicator completes.

use super::bar::ProgressBar;
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Default)]
struct Counters {
    initial: usize,
    current: usize,
}

/// Counts operations followed by one indicator.
#[derive(Debug, Clone, Default)]
pub struct PromiseTracker {
    counters: Arc<Mutex<Counters>>,
}

enum Settled {
    Partial(f64),
    Drained,
}

impl PromiseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `(initial, current)`.
    pub fn counters(&self) -> (usize, usize) {
        let c = self.lock();
        (c.initial, c.current)
    }

    /// Run `operation` on the indicator's runtime and reflect its completion
    /// on `bar`.
    ///
    /// An operation that is already complete on its first poll is not
    /// counted. A panicking operation still counts as settled; the panic is
    /// re-raised through the returned handle.
    pub fn track<F>(&self, bar: &ProgressBar, operation: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let mut operation = Box::pin(operation);
        if let Some(output) = operation.as_mut().now_or_never() {
            return bar.runtime().spawn(async move { output });
        }

        let first = {
            let mut c = self.lock();
            let first = c.current == 0;
            c.initial += 1;
            c.current += 1;
            first
        };
        if first {
            bar.start();
        }

        let tracker = self.clone();
        let runtime = bar.runtime().clone();
        let bar = bar.clone();
        runtime.spawn(async move {
            let result = AssertUnwindSafe(operation).catch_unwind().await;
            match tracker.settle() {
                Settled::Drained => {
                    debug!("all tracked operations settled");
                    bar.done(false);
                }
                Settled::Partial(ratio) => {
                    debug!(ratio, "tracked operation settled");
                    bar.set(ratio);
                }
            }
            match result {
                Ok(output) => output,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        })
    }

    fn settle(&self) -> Settled {
        let mut c = self.lock();
        c.current = c.current.saturating_sub(1);
        if c.current == 0 {
            c.initial = 0;
            Settled::Drained
        } else {
            Settled::Partial((c.initial - c.current) as f64 / c.initial as f64)
        }
    }
}
