//! Sequential transition queue
//!
//! A single worker task drains boxed futures in submission order, so at most
//! one transition runs at a time. A task that never completes stalls every
//! task behind it; there is no timeout or cancellation.

use crate::errors::{Result, ShelfError};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::debug;

type Task = BoxFuture<'static, ()>;

/// FIFO of asynchronous tasks with exactly one in flight.
#[derive(Debug, Clone)]
pub struct TransitionQueue {
    sender: mpsc::UnboundedSender<Task>,
    pending: Arc<watch::Sender<usize>>,
}

impl TransitionQueue {
    /// Spawn the worker on the current tokio runtime.
    pub fn new() -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| ShelfError::NoRuntime(e.to_string()))?;
        Ok(Self::with_handle(&handle))
    }

    /// Spawn the worker on `handle`.
    pub fn with_handle(handle: &Handle) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Task>();
        let (pending, _) = watch::channel(0usize);
        let pending = Arc::new(pending);

        let worker_pending = Arc::clone(&pending);
        handle.spawn(async move {
            while let Some(task) = receiver.recv().await {
                task.await;
                worker_pending.send_modify(|n| *n = n.saturating_sub(1));
            }
            debug!("transition queue closed");
        });

        Self { sender, pending }
    }

    /// Append `task`; it starts once every earlier task has finished.
    pub fn enqueue<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending.send_modify(|n| *n += 1);
        if self.sender.send(task.boxed()).is_err() {
            // worker gone with the runtime, nothing will ever run it
            self.pending.send_modify(|n| *n = n.saturating_sub(1));
            debug!("transition dropped, queue worker has stopped");
        }
    }

    /// Tasks queued or running.
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Wait until every task enqueued so far has completed.
    pub async fn idle(&self) {
        let mut receiver = self.pending.subscribe();
        // the sender lives in self, so wait_for cannot fail
        let _ = receiver.wait_for(|n| *n == 0).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::{sleep, Instant};

    #[tokio::test(start_paused = true)]
    async fn test_tasks_run_in_fifo_order_without_overlap() {
        let queue = TransitionQueue::new().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        for (name, delay) in [("a", 300u64), ("b", 10), ("c", 100)] {
            let log = Arc::clone(&log);
            queue.enqueue(async move {
                log.lock().unwrap().push(format!("{name}:start"));
                sleep(Duration::from_millis(delay)).await;
                log.lock().unwrap().push(format!("{name}:end"));
            });
        }

        queue.idle().await;
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:start", "a:end", "b:start", "b:end", "c:start", "c:end"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_tasks_are_sequential_in_time() {
        let queue = TransitionQueue::new().unwrap();
        let start = Instant::now();
        for _ in 0..3 {
            queue.enqueue(sleep(Duration::from_millis(200)));
        }
        assert_eq!(queue.pending(), 3);
        queue.idle().await;
        assert_eq!(start.elapsed(), Duration::from_millis(600));
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_task_blocks_followers() {
        let queue = TransitionQueue::new().unwrap();
        let ran = Arc::new(Mutex::new(false));
        queue.enqueue(futures_util::future::pending::<()>());
        let flag = Arc::clone(&ran);
        queue.enqueue(async move {
            *flag.lock().unwrap() = true;
        });

        sleep(Duration::from_secs(60)).await;
        assert!(!*ran.lock().unwrap());
        assert_eq!(queue.pending(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_pending_until_drained() {
        use tokio_test::{assert_pending, assert_ready, task};

        let queue = TransitionQueue::new().unwrap();
        queue.enqueue(sleep(Duration::from_millis(100)));
        let mut idle = task::spawn(queue.idle());
        assert_pending!(idle.poll());

        sleep(Duration::from_millis(150)).await;
        assert!(idle.is_woken());
        assert_ready!(idle.poll());
    }

    #[tokio::test]
    async fn test_idle_on_empty_queue_returns_immediately() {
        let queue = TransitionQueue::new().unwrap();
        queue.idle().await;
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        assert!(matches!(TransitionQueue::new(), Err(ShelfError::NoRuntime(_))));
    }
}
