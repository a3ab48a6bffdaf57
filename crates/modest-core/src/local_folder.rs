//! Local folder registry.
//!
//! The local account keeps its special folders as Maildirs below a single
//! directory. This module maps the on-disk folder names to folder types and
//! display names, and creates the Maildir layout.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;

/// Semantic type of a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LocalFolderType {
    /// Not a known folder.
    #[default]
    Unknown,
    /// Regular user folder.
    Normal,
    /// Incoming mail.
    Inbox,
    /// Mail waiting to be sent.
    Outbox,
    /// Sent mail.
    Sent,
    /// Deleted mail.
    Trash,
    /// Spam.
    Junk,
    /// Unsent drafts.
    Drafts,
    /// Notes.
    Notes,
    /// Archived mail.
    Archive,
    /// Root of the local folder tree.
    Root,
}

/// One row of the local folder table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalFolderInfo {
    /// Folder type.
    pub folder_type: LocalFolderType,
    /// Lowercase on-disk name.
    pub name: &'static str,
    /// English label, also the lookup key for a translated label.
    ///
    /// The library never translates it; front ends localize it.
    pub display_name: &'static str,
}

const LOCAL_FOLDERS: &[LocalFolderInfo] = &[
    LocalFolderInfo {
        folder_type: LocalFolderType::Unknown,
        name: "unknown",
        display_name: "Unknown",
    },
    LocalFolderInfo {
        folder_type: LocalFolderType::Normal,
        name: "normal",
        display_name: "Normal",
    },
    LocalFolderInfo {
        folder_type: LocalFolderType::Inbox,
        name: "inbox",
        display_name: "Inbox",
    },
    LocalFolderInfo {
        folder_type: LocalFolderType::Outbox,
        name: "outbox",
        display_name: "Outbox",
    },
    LocalFolderInfo {
        folder_type: LocalFolderType::Sent,
        name: "sent",
        display_name: "Sent",
    },
    LocalFolderInfo {
        folder_type: LocalFolderType::Trash,
        name: "trash",
        display_name: "Trash",
    },
    LocalFolderInfo {
        folder_type: LocalFolderType::Junk,
        name: "junk",
        display_name: "Junk",
    },
    LocalFolderInfo {
        folder_type: LocalFolderType::Drafts,
        name: "drafts",
        display_name: "Drafts",
    },
    LocalFolderInfo {
        folder_type: LocalFolderType::Notes,
        name: "notes",
        display_name: "Notes",
    },
    LocalFolderInfo {
        folder_type: LocalFolderType::Archive,
        name: "archive",
        display_name: "Archive",
    },
    LocalFolderInfo {
        folder_type: LocalFolderType::Root,
        name: "root",
        display_name: "Local folders",
    },
];

/// Folders created in the local account, in creation order.
const DEFAULT_LOCAL_FOLDERS: &[LocalFolderType] = &[
    LocalFolderType::Outbox,
    LocalFolderType::Drafts,
    LocalFolderType::Sent,
    LocalFolderType::Archive,
    LocalFolderType::Trash,
    LocalFolderType::Junk,
];

/// Maildir subdirectories.
const MAILDIR_SUBDIRS: [&str; 3] = ["cur", "new", "tmp"];

impl LocalFolderType {
    /// Detect the folder type from an on-disk or protocol folder name.
    ///
    /// Surrounding whitespace and case are ignored. Names that are not in
    /// the table yield [`LocalFolderType::Unknown`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let lower = name.trim().to_lowercase();
        LOCAL_FOLDERS
            .iter()
            .find(|row| row.name == lower)
            .map_or(Self::Unknown, |row| row.folder_type)
    }

    /// Canonical on-disk name.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Untranslated human-readable label.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        self.info().display_name
    }

    /// Whether this is one of the special folders of an account.
    #[must_use]
    pub const fn is_special(self) -> bool {
        !matches!(self, Self::Unknown | Self::Normal | Self::Root)
    }

    /// Iterate over every row of the table.
    pub fn all() -> impl Iterator<Item = &'static LocalFolderInfo> {
        LOCAL_FOLDERS.iter()
    }

    fn info(self) -> &'static LocalFolderInfo {
        LOCAL_FOLDERS
            .iter()
            .find(|row| row.folder_type == self)
            .unwrap_or(&LOCAL_FOLDERS[0])
    }
}

impl std::fmt::Display for LocalFolderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Folders created in the local account.
#[must_use]
pub const fn default_local_folders() -> &'static [LocalFolderType] {
    DEFAULT_LOCAL_FOLDERS
}

/// Path of the Maildir holding a special folder below `base`.
///
/// Returns `None` for types that have no folder of their own.
#[must_use]
pub fn maildir_path(base: &Path, folder_type: LocalFolderType) -> Option<PathBuf> {
    folder_type
        .is_special()
        .then(|| base.join(folder_type.name()))
}

/// Create the default local folders as Maildirs below `base`.
///
/// Existing folders are left untouched. Returns the folder paths.
///
/// # Errors
///
/// Returns an error if a directory cannot be created.
pub async fn ensure_local_folders(base: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(DEFAULT_LOCAL_FOLDERS.len());
    for &folder_type in DEFAULT_LOCAL_FOLDERS {
        let Some(path) = maildir_path(base, folder_type) else {
            continue;
        };
        create_maildir(&path).await?;
        paths.push(path);
    }
    debug!("Local folders ready in {}", base.display());
    Ok(paths)
}

/// Create a Maildir (`cur`, `new`, `tmp`) at `path`.
///
/// # Errors
///
/// Returns an error if a directory cannot be created.
pub async fn create_maildir(path: &Path) -> Result<()> {
    for sub in MAILDIR_SUBDIRS {
        tokio::fs::create_dir_all(path.join(sub)).await?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod lookup_tests {
        use super::*;

        #[test]
        fn round_trip_every_row() {
            for row in LocalFolderType::all() {
                assert_eq!(LocalFolderType::from_name(row.name).name(), row.name);
                assert_eq!(LocalFolderType::from_name(row.name), row.folder_type);
            }
        }

        #[test]
        fn case_insensitive() {
            assert_eq!(LocalFolderType::from_name("OUTBOX"), LocalFolderType::Outbox);
            assert_eq!(LocalFolderType::from_name(" Drafts "), LocalFolderType::Drafts);
        }

        #[test]
        fn unknown_name() {
            assert_eq!(LocalFolderType::from_name("bogus"), LocalFolderType::Unknown);
            assert_eq!(LocalFolderType::from_name(""), LocalFolderType::Unknown);
        }

        #[test]
        fn types_are_unique() {
            let rows: Vec<_> = LocalFolderType::all().collect();
            for (i, a) in rows.iter().enumerate() {
                for b in &rows[i + 1..] {
                    assert_ne!(a.folder_type, b.folder_type);
                    assert_ne!(a.name, b.name);
                }
            }
        }

        #[test]
        fn display_names() {
            assert_eq!(LocalFolderType::Outbox.display_name(), "Outbox");
            assert_eq!(LocalFolderType::Root.display_name(), "Local folders");
            assert_eq!(format!("{}", LocalFolderType::Sent), "Sent");
        }

        #[test]
        fn special_folders() {
            assert!(LocalFolderType::Trash.is_special());
            assert!(!LocalFolderType::Normal.is_special());
            assert!(!LocalFolderType::Root.is_special());
            assert!(default_local_folders().iter().all(|t| t.is_special()));
        }
    }

    mod maildir_tests {
        use super::*;

        #[test]
        fn path_for_special_folder() {
            let base = Path::new("/data/local_folders");
            assert_eq!(
                maildir_path(base, LocalFolderType::Outbox),
                Some(PathBuf::from("/data/local_folders/outbox"))
            );
            assert_eq!(maildir_path(base, LocalFolderType::Normal), None);
        }

        #[tokio::test]
        async fn ensure_creates_maildirs() {
            let dir = tempfile::tempdir().unwrap();
            let paths = ensure_local_folders(dir.path()).await.unwrap();
            assert_eq!(paths.len(), default_local_folders().len());
            for path in &paths {
                for sub in MAILDIR_SUBDIRS {
                    assert!(path.join(sub).is_dir());
                }
            }

            // Idempotent
            let again = ensure_local_folders(dir.path()).await.unwrap();
            assert_eq!(paths, again);
        }
    }
}
