//! Mail operations.
//!
//! Long running work (sending, retrieving, folder transfers) is wrapped in
//! a [`MailTask`] and run by a [`MailOperationQueue`], which tracks progress,
//! errors and cancellation.

mod operation;
mod queue;
mod transfer;

pub use operation::{
    MailTask, OperationContext, OperationError, OperationId, OperationStatus, OperationType,
    Progress, TaskFuture,
};
pub use queue::{MailOperationQueue, OperationHandle, OperationOutcome, QueueEvent};
pub use transfer::TransferFolder;
