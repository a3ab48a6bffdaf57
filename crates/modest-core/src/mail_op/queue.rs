//! Mail operation queue.
//!
//! Operations are executed one at a time, in submission order, by a worker
//! task spawned on the tokio runtime. Subscribers observe the queue through
//! a broadcast channel of [`QueueEvent`]s.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::operation::{
    MailTask, OperationContext, OperationError, OperationId, OperationStatus, OperationType,
    Progress,
};

/// Capacity of the event channel; slow subscribers miss older events.
const EVENT_CAPACITY: usize = 256;

/// Notification about the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// An operation was queued.
    Added {
        /// Operation identifier.
        id: OperationId,
        /// Operation kind.
        op_type: OperationType,
    },
    /// An operation started running.
    Started {
        /// Operation identifier.
        id: OperationId,
    },
    /// A running operation reported progress.
    Progress {
        /// Operation identifier.
        id: OperationId,
        /// Current progress.
        progress: Progress,
    },
    /// An operation finished and left the queue.
    Finished {
        /// Operation identifier.
        id: OperationId,
        /// Final status.
        status: OperationStatus,
        /// Error message for failed operations.
        error: Option<String>,
    },
}

/// Final result of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    /// Operation identifier.
    pub id: OperationId,
    /// Final status.
    pub status: OperationStatus,
    /// Error for failed operations.
    pub error: Option<OperationError>,
}

/// Handle to a queued operation.
#[derive(Debug)]
pub struct OperationHandle {
    id: OperationId,
    done: oneshot::Receiver<OperationOutcome>,
}

impl OperationHandle {
    /// Identifier of the operation.
    #[must_use]
    pub const fn id(&self) -> OperationId {
        self.id
    }

    /// Wait for the operation to finish.
    ///
    /// If the queue shuts down before the operation ran, the outcome is
    /// `Canceled`.
    pub async fn wait(self) -> OperationOutcome {
        self.done.await.unwrap_or(OperationOutcome {
            id: self.id,
            status: OperationStatus::Canceled,
            error: Some(OperationError::Canceled),
        })
    }
}

struct Queued {
    id: OperationId,
    task: Box<dyn MailTask>,
    cancel: watch::Receiver<bool>,
    done: oneshot::Sender<OperationOutcome>,
}

/// Cancellation senders of the operations that have not finished yet.
type Pending = Arc<Mutex<HashMap<OperationId, watch::Sender<bool>>>>;

/// Serial queue of mail operations.
#[derive(Debug, Clone)]
pub struct MailOperationQueue {
    tx: mpsc::UnboundedSender<Queued>,
    events: broadcast::Sender<QueueEvent>,
    pending: Pending,
    next_id: Arc<AtomicU64>,
}

impl MailOperationQueue {
    /// Create a queue and spawn its worker.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let pending = Pending::default();

        tokio::spawn(worker(rx, events.clone(), Arc::clone(&pending)));

        Self {
            tx,
            events,
            pending,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Queue a task.
    pub fn add(&self, task: impl MailTask + 'static) -> OperationHandle {
        let id = OperationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let op_type = task.op_type();
        let (cancel_tx, cancel) = watch::channel(false);
        let (done_tx, done) = oneshot::channel();

        lock(&self.pending).insert(id, cancel_tx);
        debug!("Queued operation {id}: {}", task.description());
        let _ = self.events.send(QueueEvent::Added { id, op_type });

        let queued = Queued {
            id,
            task: Box::new(task),
            cancel,
            done: done_tx,
        };
        if let Err(mpsc::error::SendError(queued)) = self.tx.send(queued) {
            warn!("Operation queue worker is gone, canceling {id}");
            lock(&self.pending).remove(&id);
            let _ = queued.done.send(OperationOutcome {
                id,
                status: OperationStatus::Canceled,
                error: Some(OperationError::Canceled),
            });
        }

        OperationHandle { id, done }
    }

    /// Request cancellation of an operation.
    ///
    /// A queued operation is dropped without running; a running one is told
    /// to stop. Returns `false` if the operation already finished.
    pub fn cancel(&self, id: OperationId) -> bool {
        let pending = lock(&self.pending);
        match pending.get(&id) {
            Some(cancel) => {
                cancel.send_replace(true);
                info!("Canceling operation {id}");
                true
            }
            None => false,
        }
    }

    /// Request cancellation of every unfinished operation.
    pub fn cancel_all(&self) {
        let pending = lock(&self.pending);
        for cancel in pending.values() {
            cancel.send_replace(true);
        }
        info!("Canceling {} operations", pending.len());
    }

    /// Number of queued and running operations.
    #[must_use]
    pub fn num_elements(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Subscribe to queue events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }
}

impl Default for MailOperationQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn worker(
    mut rx: mpsc::UnboundedReceiver<Queued>,
    events: broadcast::Sender<QueueEvent>,
    pending: Pending,
) {
    while let Some(queued) = rx.recv().await {
        let Queued {
            id,
            task,
            cancel,
            done,
        } = queued;

        let (status, error) = if *cancel.borrow() {
            debug!("Operation {id} canceled before it started");
            (OperationStatus::Canceled, Some(OperationError::Canceled))
        } else {
            let _ = events.send(QueueEvent::Started { id });
            info!("Running operation {id}: {}", task.description());
            let ctx = OperationContext::new(id, events.clone(), cancel);
            // Own task, so a panic fails this operation only
            let run = tokio::spawn(async move { task.run(&ctx).await });
            match run.await {
                Ok(Ok(())) => (OperationStatus::Success, None),
                Ok(Err(OperationError::Canceled)) => {
                    (OperationStatus::Canceled, Some(OperationError::Canceled))
                }
                Ok(Err(e)) => {
                    warn!("Operation {id} failed: {e}");
                    (OperationStatus::Failed, Some(e))
                }
                Err(e) => {
                    warn!("Operation {id} aborted: {e}");
                    (
                        OperationStatus::Failed,
                        Some(OperationError::Operation(e.to_string())),
                    )
                }
            }
        };

        lock(&pending).remove(&id);
        debug!("Operation {id} finished: {status:?}");
        let _ = events.send(QueueEvent::Finished {
            id,
            status,
            error: error.as_ref().map(ToString::to_string),
        });
        let _ = done.send(OperationOutcome { id, status, error });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;
    use crate::mail_op::TaskFuture;

    /// Records its start order and optionally blocks until released.
    struct TestTask {
        label: usize,
        log: Arc<Mutex<Vec<usize>>>,
        gate: Option<Arc<tokio::sync::Notify>>,
        fail: bool,
    }

    impl TestTask {
        fn new(label: usize, log: &Arc<Mutex<Vec<usize>>>) -> Self {
            Self {
                label,
                log: Arc::clone(log),
                gate: None,
                fail: false,
            }
        }
    }

    impl MailTask for TestTask {
        fn op_type(&self) -> OperationType {
            OperationType::Info
        }

        fn description(&self) -> String {
            format!("test task {}", self.label)
        }

        fn run<'a>(&'a self, ctx: &'a OperationContext) -> TaskFuture<'a> {
            Box::pin(async move {
                self.log.lock().unwrap().push(self.label);
                if let Some(gate) = &self.gate {
                    tokio::select! {
                        () = gate.notified() => {}
                        () = ctx.canceled() => return Err(OperationError::Canceled),
                    }
                }
                ctx.set_progress(1, 1);
                if self.fail {
                    return Err(OperationError::Operation("boom".to_string()));
                }
                Ok(())
            })
        }
    }

    /// Counts how often it ran and never blocks.
    struct CountingTask(Arc<AtomicUsize>);

    impl MailTask for CountingTask {
        fn op_type(&self) -> OperationType {
            OperationType::Send
        }

        fn description(&self) -> String {
            "counting".to_string()
        }

        fn run<'a>(&'a self, _ctx: &'a OperationContext) -> TaskFuture<'a> {
            Box::pin(async move {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    /// Panics as soon as it runs.
    struct PanickingTask;

    impl MailTask for PanickingTask {
        fn op_type(&self) -> OperationType {
            OperationType::Receive
        }

        fn description(&self) -> String {
            "panicking".to_string()
        }

        fn run<'a>(&'a self, _ctx: &'a OperationContext) -> TaskFuture<'a> {
            Box::pin(explode())
        }
    }

    #[allow(clippy::unused_async)]
    async fn explode() -> Result<(), OperationError> {
        panic!("task bug")
    }

    #[tokio::test]
    async fn test_runs_in_order() {
        let queue = MailOperationQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..5)
            .map(|i| queue.add(TestTask::new(i, &log)))
            .collect();
        for handle in handles {
            assert_eq!(handle.wait().await.status, OperationStatus::Success);
        }

        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.num_elements(), 0);
    }

    #[tokio::test]
    async fn test_failure_reported() {
        let queue = MailOperationQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut task = TestTask::new(0, &log);
        task.fail = true;

        let outcome = queue.add(task).wait().await;
        assert_eq!(outcome.status, OperationStatus::Failed);
        assert_eq!(
            outcome.error,
            Some(OperationError::Operation("boom".to_string()))
        );
    }

    #[tokio::test]
    async fn test_panicking_task_fails_alone() {
        let queue = MailOperationQueue::new();
        let count = Arc::new(AtomicUsize::new(0));

        let broken = queue.add(PanickingTask);
        let next = queue.add(CountingTask(Arc::clone(&count)));

        let outcome = broken.wait().await;
        assert_eq!(outcome.status, OperationStatus::Failed);
        assert!(matches!(outcome.error, Some(OperationError::Operation(_))));
        assert_eq!(next.wait().await.status, OperationStatus::Success);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(queue.num_elements(), 0);
    }

    #[tokio::test]
    async fn test_cancel_queued_operation_never_runs() {
        let queue = MailOperationQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let gate = Arc::new(tokio::sync::Notify::new());

        let mut blocker = TestTask::new(0, &log);
        blocker.gate = Some(Arc::clone(&gate));
        let first = queue.add(blocker);

        let count = Arc::new(AtomicUsize::new(0));
        let second = queue.add(CountingTask(Arc::clone(&count)));
        assert_eq!(queue.num_elements(), 2);

        assert!(queue.cancel(second.id()));
        gate.notify_one();

        assert_eq!(first.wait().await.status, OperationStatus::Success);
        assert_eq!(second.wait().await.status, OperationStatus::Canceled);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_running_operation() {
        let queue = MailOperationQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut blocker = TestTask::new(0, &log);
        blocker.gate = Some(Arc::new(tokio::sync::Notify::new()));
        let mut events = queue.subscribe();

        let handle = queue.add(blocker);
        // Wait until it is running
        loop {
            if let QueueEvent::Started { id } = events.recv().await.unwrap() {
                assert_eq!(id, handle.id());
                break;
            }
        }
        assert!(queue.cancel(handle.id()));

        let outcome = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .unwrap();
        assert_eq!(outcome.status, OperationStatus::Canceled);
    }

    #[tokio::test]
    async fn test_cancel_finished_operation() {
        let queue = MailOperationQueue::new();
        let count = Arc::new(AtomicUsize::new(0));
        let handle = queue.add(CountingTask(Arc::clone(&count)));
        let id = handle.id();
        handle.wait().await;
        assert!(!queue.cancel(id));
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let queue = MailOperationQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut blocker = TestTask::new(0, &log);
        blocker.gate = Some(Arc::new(tokio::sync::Notify::new()));
        let count = Arc::new(AtomicUsize::new(0));

        let first = queue.add(blocker);
        let second = queue.add(CountingTask(Arc::clone(&count)));
        queue.cancel_all();

        assert_eq!(first.wait().await.status, OperationStatus::Canceled);
        assert_eq!(second.wait().await.status, OperationStatus::Canceled);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_event_sequence() {
        let queue = MailOperationQueue::new();
        let mut events = queue.subscribe();
        let log = Arc::new(Mutex::new(Vec::new()));

        let id = queue.add(TestTask::new(7, &log)).id();

        assert_eq!(
            events.recv().await.unwrap(),
            QueueEvent::Added {
                id,
                op_type: OperationType::Info
            }
        );
        assert_eq!(events.recv().await.unwrap(), QueueEvent::Started { id });
        assert_eq!(
            events.recv().await.unwrap(),
            QueueEvent::Progress {
                id,
                progress: Progress { done: 1, total: 1 }
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            QueueEvent::Finished {
                id,
                status: OperationStatus::Success,
                error: None
            }
        );
    }
}
