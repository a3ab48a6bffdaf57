//! # modest-core
//!
//! Core of the Modest email client.
//!
//! This crate provides:
//! - Protocol registry (store, transport, security and authentication)
//! - Local folder registry and Maildir layout
//! - Account key codec and account management
//! - Configuration storage (`SQLite`)
//! - Credential storage (system keyring)
//! - Mail operation queue with progress and cancellation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod config;
mod error;
pub mod local_folder;
pub mod mail_op;
pub mod protocol;

pub use account::credentials;
pub use account::{
    AccountData, AccountManager, CredentialError, CredentialResult, DecomposedKey,
    ServerAccountData, ServerRole, ValidationError, ValidationResult, validate_server_account,
};
pub use config::{ConfigStore, ConfigValue};
pub use error::{Error, Result};
pub use local_folder::{LocalFolderType, default_local_folders, ensure_local_folders, maildir_path};
pub use mail_op::{
    MailOperationQueue, MailTask, OperationError, OperationHandle, OperationId, OperationStatus,
    OperationType, Progress, QueueEvent, TransferFolder,
};
pub use protocol::{AuthProtocol, ConnectionProtocol, ProtocolInfo, TransportStoreProtocol};
