//! Single-threaded cooperative task dispatch
//!
//! All session operations funnel through one queue drained by one loop, so
//! no two of them ever interleave and the session needs no locks. `post` is
//! synchronous, never blocks, and is safe to call from any execution context
//! (a signal task, another tokio task, a plain thread); only the dispatch
//! loop itself touches the owned state.
//!
//! Tasks take the state by value and hand it back with their outcome, which
//! makes exclusive ownership structural: a task cannot outlive its turn with
//! the session.

use crate::error::DeviceError;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// What a task leaves behind: the state, back, and how the task fared.
pub type TaskOutcome<S> = (S, Result<(), DeviceError>);

/// Future produced by a running task.
pub type TaskFuture<S> = Pin<Box<dyn Future<Output = TaskOutcome<S>> + Send>>;

/// A deferred unit of work over the dispatcher-owned state. Consumed exactly
/// once, in FIFO order relative to other tasks.
pub type Task<S> = Box<dyn FnOnce(S) -> TaskFuture<S> + Send>;

/// Posting side of the queue. Cheap to clone and hand to trigger sources.
pub struct DispatchHandle<S> {
    queue: mpsc::UnboundedSender<Task<S>>,
}

impl<S> Clone for DispatchHandle<S> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

/// The dispatch loop stopped; nothing will run the posted task.
#[derive(Debug, Error)]
#[error("dispatch loop is no longer running")]
pub struct PostError;

impl<S> DispatchHandle<S> {
    /// Enqueue a task without blocking. The queue is unbounded by design:
    /// the trigger source must never stall, and trigger rates are physical
    /// (a human pressing a button), not adversarial.
    pub fn post(&self, task: Task<S>) -> Result<(), PostError> {
        self.queue.send(task).map_err(|_| PostError)
    }
}

/// Owner of the state and the queue receiver.
pub struct Dispatcher<S> {
    state: S,
    queue: mpsc::UnboundedReceiver<Task<S>>,
}

impl<S> Dispatcher<S> {
    pub fn new(state: S) -> (Self, DispatchHandle<S>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { state, queue: rx }, DispatchHandle { queue: tx })
    }

    /// Drain tasks in strict submission order, forever.
    ///
    /// Each task runs to completion before the next starts: no preemption,
    /// no reentrancy. A task error is logged and dropped: one bad message
    /// never halts the device. The loop only ends when every handle has been
    /// dropped (which never happens in normal operation); the state is then
    /// returned for inspection.
    pub async fn dispatch_forever(self) -> S {
        let Dispatcher {
            mut state,
            mut queue,
        } = self;

        while let Some(task) = queue.recv().await {
            let (next_state, outcome) = task(state).await;
            state = next_state;
            if let Err(err) = outcome {
                warn!(error = %err, "dispatched task failed, continuing");
            }
        }

        debug!("all dispatch handles dropped, queue drained");
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::PublishError;
    use crate::session::SessionState;

    fn record(value: u32) -> Task<Vec<u32>> {
        Box::new(move |mut log: Vec<u32>| {
            Box::pin(async move {
                log.push(value);
                (log, Ok(()))
            })
        })
    }

    fn failing(value: u32) -> Task<Vec<u32>> {
        Box::new(move |mut log: Vec<u32>| {
            Box::pin(async move {
                log.push(value);
                let err = DeviceError::from(PublishError::NotConnected {
                    state: SessionState::Disconnected,
                });
                (log, Err(err))
            })
        })
    }

    #[tokio::test]
    async fn test_tasks_run_in_fifo_order() {
        let (dispatcher, handle) = Dispatcher::new(Vec::new());

        for value in 0..8 {
            handle.post(record(value)).unwrap();
        }
        drop(handle);

        let log = dispatcher.dispatch_forever().await;
        assert_eq!(log, (0..8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_failing_task_never_blocks_the_next() {
        let (dispatcher, handle) = Dispatcher::new(Vec::new());

        handle.post(record(1)).unwrap();
        handle.post(failing(2)).unwrap();
        handle.post(record(3)).unwrap();
        drop(handle);

        let log = dispatcher.dispatch_forever().await;
        assert_eq!(log, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_post_is_callable_from_a_plain_thread() {
        // The trigger source may run on a foreign execution context; post
        // must work there without an async runtime and without blocking.
        let (dispatcher, handle) = Dispatcher::new(Vec::new());

        let poster = std::thread::spawn(move || {
            for value in 0..4 {
                handle.post(record(value)).unwrap();
            }
            // handle dropped here, letting the loop drain and finish
        });
        poster.join().unwrap();

        let log = dispatcher.dispatch_forever().await;
        assert_eq!(log, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_post_after_loop_ends_reports_closed() {
        let (dispatcher, handle) = Dispatcher::new(Vec::<u32>::new());
        drop(dispatcher);

        let result = handle.post(Box::new(|log| Box::pin(async move { (log, Ok(())) })));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_interleaved_posting_preserves_submission_order() {
        let (dispatcher, handle) = Dispatcher::new(Vec::new());
        let late_handle = handle.clone();

        handle.post(record(10)).unwrap();
        handle.post(record(20)).unwrap();
        late_handle.post(record(30)).unwrap();
        drop(handle);
        drop(late_handle);

        let log = dispatcher.dispatch_forever().await;
        assert_eq!(log, vec![10, 20, 30]);
    }
}
