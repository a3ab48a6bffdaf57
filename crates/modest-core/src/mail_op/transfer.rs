//! Local folder transfer.
//!
//! Copies or moves a Maildir folder (with its subfolders) into another
//! parent folder. Symbolic links inside the folder are not transferred.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::operation::{MailTask, OperationContext, OperationError, OperationType, TaskFuture};

/// Copy or move a local folder.
#[derive(Debug, Clone)]
pub struct TransferFolder {
    source: PathBuf,
    parent: PathBuf,
    new_name: Option<String>,
    delete_original: bool,
}

impl TransferFolder {
    /// Copy `source` into `parent`, keeping its name.
    #[must_use]
    pub fn copy(source: impl Into<PathBuf>, parent: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            parent: parent.into(),
            new_name: None,
            delete_original: false,
        }
    }

    /// Move `source` into `parent`, keeping its name.
    #[must_use]
    pub fn r#move(source: impl Into<PathBuf>, parent: impl Into<PathBuf>) -> Self {
        Self {
            delete_original: true,
            ..Self::copy(source, parent)
        }
    }

    /// Give the transferred folder another name.
    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.new_name = Some(name.to_string());
        self
    }

    /// Path the folder will have after the transfer.
    #[must_use]
    pub fn destination(&self) -> Option<PathBuf> {
        let name = match &self.new_name {
            Some(name) => std::ffi::OsStr::new(name.as_str()),
            None => self.source.file_name()?,
        };
        Some(self.parent.join(name))
    }

    async fn transfer(&self, ctx: &OperationContext) -> Result<(), OperationError> {
        if !tokio::fs::try_exists(&self.source).await? {
            return Err(OperationError::FolderNotFound(display(&self.source)));
        }
        if !tokio::fs::try_exists(&self.parent).await? {
            return Err(OperationError::FolderNotFound(display(&self.parent)));
        }

        let source = tokio::fs::canonicalize(&self.source).await?;
        let parent = tokio::fs::canonicalize(&self.parent).await?;
        if parent.starts_with(&source) {
            return Err(OperationError::IntoItself(display(&self.source)));
        }

        let destination = self
            .destination()
            .ok_or_else(|| OperationError::Operation("Folder has no name".to_string()))?;
        if tokio::fs::try_exists(&destination).await? {
            return Err(OperationError::FolderExists(display(&destination)));
        }

        // A rename is enough when moving within one file system
        if self.delete_original && tokio::fs::rename(&source, &destination).await.is_ok() {
            ctx.set_progress(1, 1);
            return Ok(());
        }

        let entries = collect_entries(&source).await?;
        copy_into(&source, &destination, &entries, ctx).await?;

        if self.delete_original {
            tokio::fs::remove_dir_all(&source).await?;
        }
        Ok(())
    }
}

impl MailTask for TransferFolder {
    fn op_type(&self) -> OperationType {
        OperationType::Info
    }

    fn description(&self) -> String {
        let verb = if self.delete_original {
            "Moving"
        } else {
            "Copying"
        };
        format!(
            "{verb} {} to {}",
            self.source.display(),
            self.parent.display()
        )
    }

    fn run<'a>(&'a self, ctx: &'a OperationContext) -> TaskFuture<'a> {
        Box::pin(self.transfer(ctx))
    }
}

/// Relative paths below a folder.
#[derive(Debug, Default)]
struct Entries {
    /// Directories, parents first.
    dirs: Vec<PathBuf>,
    files: Vec<PathBuf>,
}

/// Relative paths of every directory and file below `root`.
///
/// Symbolic links are skipped.
async fn collect_entries(root: &Path) -> std::io::Result<Entries> {
    let mut found = Entries::default();
    let mut stack = vec![PathBuf::new()];

    while let Some(rel) = stack.pop() {
        let mut entries = tokio::fs::read_dir(root.join(&rel)).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = rel.join(entry.file_name());
            let file_type = entry.file_type().await?;
            if file_type.is_symlink() {
                warn!("Skipping symbolic link {}", root.join(&path).display());
            } else if file_type.is_dir() {
                found.dirs.push(path.clone());
                stack.push(path);
            } else {
                found.files.push(path);
            }
        }
    }
    Ok(found)
}

/// Copy `entries` from `source` into the new folder `destination`.
///
/// On any error, cancellation included, the partial copy is removed so the
/// transfer can be retried.
async fn copy_into(
    source: &Path,
    destination: &Path,
    entries: &Entries,
    ctx: &OperationContext,
) -> Result<(), OperationError> {
    let result = copy_tree(source, destination, entries, ctx).await;
    if let Err(e) = &result {
        debug!("Transfer stopped ({e}), removing {}", destination.display());
        match tokio::fs::remove_dir_all(destination).await {
            Err(cleanup) if cleanup.kind() != ErrorKind::NotFound => {
                warn!("Cannot remove {}: {cleanup}", destination.display());
            }
            _ => {}
        }
    }
    result
}

async fn copy_tree(
    source: &Path,
    destination: &Path,
    entries: &Entries,
    ctx: &OperationContext,
) -> Result<(), OperationError> {
    let total = entries.files.len() as u64;
    ctx.set_progress(0, total);

    tokio::fs::create_dir_all(destination).await?;
    for dir in &entries.dirs {
        tokio::fs::create_dir_all(destination.join(dir)).await?;
    }
    for (done, file) in (1..).zip(&entries.files) {
        ctx.check_canceled()?;
        tokio::fs::copy(source.join(file), destination.join(file)).await?;
        ctx.set_progress(done, total);
    }
    Ok(())
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::sync::{broadcast, watch};

    use super::*;
    use crate::local_folder::create_maildir;
    use crate::mail_op::{MailOperationQueue, OperationId, OperationStatus, QueueEvent};

    fn context() -> (OperationContext, watch::Sender<bool>) {
        let (events, _) = broadcast::channel(16);
        let (cancel_tx, cancel) = watch::channel(false);
        (OperationContext::new(OperationId(1), events, cancel), cancel_tx)
    }

    async fn folder_with_messages(root: &Path, name: &str, count: usize) -> PathBuf {
        let folder = root.join(name);
        create_maildir(&folder).await.unwrap();
        for i in 0..count {
            tokio::fs::write(folder.join("cur").join(format!("{i}.eml")), b"Subject: hi\r\n\r\n")
                .await
                .unwrap();
        }
        folder
    }

    #[tokio::test]
    async fn test_copy_folder() {
        let dir = tempfile::tempdir().unwrap();
        let source = folder_with_messages(dir.path(), "work", 3).await;
        let parent = dir.path().join("archive");
        create_maildir(&parent).await.unwrap();

        let queue = MailOperationQueue::new();
        let outcome = queue.add(TransferFolder::copy(&source, &parent)).wait().await;
        assert_eq!(outcome.status, OperationStatus::Success);

        assert!(parent.join("work/cur/0.eml").is_file());
        assert!(parent.join("work/new").is_dir());
        assert!(source.join("cur/2.eml").is_file());
    }

    #[tokio::test]
    async fn test_move_folder_with_new_name() {
        let dir = tempfile::tempdir().unwrap();
        let source = folder_with_messages(dir.path(), "work", 2).await;
        let parent = dir.path().join("archive");
        create_maildir(&parent).await.unwrap();

        let queue = MailOperationQueue::new();
        let task = TransferFolder::r#move(&source, &parent).with_name("old-work");
        assert_eq!(task.destination(), Some(parent.join("old-work")));
        let outcome = queue.add(task).wait().await;
        assert_eq!(outcome.status, OperationStatus::Success);

        assert!(parent.join("old-work/cur/1.eml").is_file());
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn test_move_into_itself_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = folder_with_messages(dir.path(), "work", 1).await;
        let child = source.join("cur");

        let queue = MailOperationQueue::new();
        let outcome = queue.add(TransferFolder::r#move(&source, &child)).wait().await;
        assert_eq!(outcome.status, OperationStatus::Failed);
        assert!(matches!(outcome.error, Some(OperationError::IntoItself(_))));
        assert!(source.join("cur/0.eml").is_file());
    }

    #[tokio::test]
    async fn test_existing_destination_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = folder_with_messages(dir.path(), "work", 1).await;
        let parent = dir.path().join("archive");
        create_maildir(&parent.join("work")).await.unwrap();

        let queue = MailOperationQueue::new();
        let outcome = queue.add(TransferFolder::copy(&source, &parent)).wait().await;
        assert!(matches!(outcome.error, Some(OperationError::FolderExists(_))));
    }

    #[tokio::test]
    async fn test_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let queue = MailOperationQueue::new();
        let outcome = queue
            .add(TransferFolder::copy(dir.path().join("nope"), dir.path()))
            .wait()
            .await;
        assert!(matches!(outcome.error, Some(OperationError::FolderNotFound(_))));
    }

    #[tokio::test]
    async fn test_collect_entries() {
        let dir = tempfile::tempdir().unwrap();
        let source = folder_with_messages(dir.path(), "work", 2).await;
        let mut entries = collect_entries(&source).await.unwrap();
        assert_eq!(entries.dirs.len(), 3);
        entries.files.sort();
        assert_eq!(
            entries.files,
            vec![PathBuf::from("cur/0.eml"), PathBuf::from("cur/1.eml")]
        );
    }

    #[tokio::test]
    async fn test_failed_copy_removes_destination() {
        let dir = tempfile::tempdir().unwrap();
        let source = folder_with_messages(dir.path(), "work", 2).await;
        let parent = dir.path().join("archive");
        create_maildir(&parent).await.unwrap();
        let destination = parent.join("work");

        // A message that vanished after the folder was listed
        let mut entries = collect_entries(&source).await.unwrap();
        entries.files.push(PathBuf::from("cur/gone.eml"));
        let (ctx, _cancel) = context();
        let err = copy_into(&source, &destination, &entries, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::Io(_)));
        assert!(!destination.exists());

        // Nothing left behind blocks a retry
        let queue = MailOperationQueue::new();
        let outcome = queue.add(TransferFolder::copy(&source, &parent)).wait().await;
        assert_eq!(outcome.status, OperationStatus::Success);
        assert!(destination.join("cur/1.eml").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let source = folder_with_messages(dir.path(), "work", 1).await;
        tokio::fs::symlink(dir.path().join("missing"), source.join("cur/dangling"))
            .await
            .unwrap();
        let parent = dir.path().join("archive");
        create_maildir(&parent).await.unwrap();

        let queue = MailOperationQueue::new();
        let outcome = queue.add(TransferFolder::copy(&source, &parent)).wait().await;
        assert_eq!(outcome.status, OperationStatus::Success);
        assert!(parent.join("work/cur/0.eml").is_file());
        assert!(
            tokio::fs::symlink_metadata(parent.join("work/cur/dangling"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_canceled_copy_removes_destination() {
        let dir = tempfile::tempdir().unwrap();
        let source = folder_with_messages(dir.path(), "work", 3).await;
        let parent = dir.path().join("archive");
        create_maildir(&parent).await.unwrap();

        let (ctx, cancel) = context();
        cancel.send_replace(true);
        let err = TransferFolder::copy(&source, &parent)
            .transfer(&ctx)
            .await
            .unwrap_err();
        assert_eq!(err, OperationError::Canceled);
        assert!(!parent.join("work").exists());
        for i in 0..3 {
            assert!(source.join(format!("cur/{i}.eml")).is_file());
        }
    }

    #[tokio::test]
    async fn test_cancel_copy_through_queue() {
        let dir = tempfile::tempdir().unwrap();
        let source = folder_with_messages(dir.path(), "work", 64).await;
        let parent = dir.path().join("archive");
        create_maildir(&parent).await.unwrap();

        let queue = MailOperationQueue::new();
        let mut events = queue.subscribe();
        let handle = queue.add(TransferFolder::copy(&source, &parent));
        let id = handle.id();

        // Cancel once the copy has started
        loop {
            if let QueueEvent::Progress { id: op, .. } = events.recv().await.unwrap() {
                assert_eq!(op, id);
                break;
            }
        }
        assert!(queue.cancel(id));

        let outcome = handle.wait().await;
        assert_eq!(outcome.status, OperationStatus::Canceled);
        assert!(!parent.join("work").exists());
        assert!(source.join("cur/63.eml").is_file());
    }
}
