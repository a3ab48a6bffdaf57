//! Mail operation types.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use super::queue::QueueEvent;

/// Identifier of a queued operation, unique per queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(pub u64);

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What an operation does, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    /// Sending mail.
    Send,
    /// Retrieving mail.
    Receive,
    /// Opening a message or folder.
    Open,
    /// Deleting mail.
    Delete,
    /// Anything else (folder transfers, refreshes).
    Info,
}

/// Lifecycle state of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OperationStatus {
    /// Not yet started.
    #[default]
    Invalid,
    /// Running.
    InProgress,
    /// Finished without errors.
    Success,
    /// Finished with an error.
    Failed,
    /// Canceled before or while running.
    Canceled,
}

impl OperationStatus {
    /// Whether the operation has reached a final state.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Canceled)
    }
}

/// Progress of a running operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    /// Units of work done.
    pub done: u64,
    /// Total units of work (0 when unknown).
    pub total: u64,
}

/// Errors reported by mail operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    /// The operation was canceled.
    #[error("Operation canceled")]
    Canceled,

    /// The source of a transfer does not exist.
    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    /// The destination already exists.
    #[error("Folder already exists: {0}")]
    FolderExists(String),

    /// A folder cannot be transferred into itself or one of its children.
    #[error("Cannot transfer {0} into itself")]
    IntoItself(String),

    /// File system error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Any other failure.
    #[error("Operation failed: {0}")]
    Operation(String),
}

impl From<std::io::Error> for OperationError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Future returned by [`MailTask::run`].
pub type TaskFuture<'a> = Pin<Box<dyn Future<Output = Result<(), OperationError>> + Send + 'a>>;

/// Work executed by the operation queue.
pub trait MailTask: Send + Sync {
    /// Kind of operation.
    fn op_type(&self) -> OperationType;

    /// Short description for logs and progress displays.
    fn description(&self) -> String;

    /// Run the task.
    ///
    /// Long running tasks should report progress through `ctx` and return
    /// [`OperationError::Canceled`] once [`OperationContext::is_canceled`]
    /// turns true.
    fn run<'a>(&'a self, ctx: &'a OperationContext) -> TaskFuture<'a>;
}

/// Handle given to a running task.
#[derive(Debug)]
pub struct OperationContext {
    id: OperationId,
    events: broadcast::Sender<QueueEvent>,
    cancel: watch::Receiver<bool>,
}

impl OperationContext {
    pub(super) const fn new(
        id: OperationId,
        events: broadcast::Sender<QueueEvent>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self { id, events, cancel }
    }

    /// Identifier of the running operation.
    #[must_use]
    pub const fn id(&self) -> OperationId {
        self.id
    }

    /// Report progress to queue subscribers.
    pub fn set_progress(&self, done: u64, total: u64) {
        // No subscribers is fine
        let _ = self.events.send(QueueEvent::Progress {
            id: self.id,
            progress: Progress { done, total },
        });
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Return [`OperationError::Canceled`] if cancellation was requested.
    ///
    /// # Errors
    ///
    /// Returns `Canceled` once the operation has been canceled.
    pub fn check_canceled(&self) -> Result<(), OperationError> {
        if self.is_canceled() {
            Err(OperationError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Resolve once cancellation is requested.
    pub async fn canceled(&self) {
        let mut cancel = self.cancel.clone();
        if cancel.wait_for(|canceled| *canceled).await.is_err() {
            // The queue is gone; nobody can cancel any more
            std::future::pending::<()>().await;
        }
    }
}
