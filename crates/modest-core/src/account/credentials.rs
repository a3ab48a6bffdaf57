//! Secure credential storage using system keyring.
//!
//! Server account passwords are kept out of the configuration database and
//! stored with the platform's native credential storage:
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager

use keyring::Entry;
use tracing::{debug, warn};

use super::key::escape;

/// Service name used for keyring entries.
const SERVICE_NAME: &str = "modest";

/// Error type for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to access keyring.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// Server account name is required for credential operations.
    #[error("Server account name is required for credential storage")]
    MissingAccountName,
}

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Generates the keyring entry key for a server account password.
fn credential_key(server_account: &str) -> String {
    format!("{SERVICE_NAME}_password_{}", escape(server_account))
}

fn entry(server_account: &str) -> CredentialResult<Entry> {
    if server_account.is_empty() {
        return Err(CredentialError::MissingAccountName);
    }
    Ok(Entry::new(SERVICE_NAME, &credential_key(server_account))?)
}

/// Stores the password of a server account in the system keyring.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn store_password(server_account: &str, password: &str) -> CredentialResult<()> {
    entry(server_account)?.set_password(password)?;
    debug!("Stored password for server account {server_account}");
    Ok(())
}

/// Retrieves the password of a server account from the system keyring.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn get_password(server_account: &str) -> CredentialResult<Option<String>> {
    match entry(server_account)?.get_password() {
        Ok(password) => Ok(Some(password)),
        Err(keyring::Error::NoEntry) => {
            debug!("No password found for server account {server_account}");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Deletes the password of a server account from the keyring.
///
/// A missing entry is not an error.
///
/// # Errors
///
/// Returns an error if the keyring operation fails (except for missing entries).
pub fn delete_password(server_account: &str) -> CredentialResult<()> {
    match entry(server_account)?.delete_credential() {
        Ok(()) => {
            debug!("Deleted password for server account {server_account}");
            Ok(())
        }
        Err(keyring::Error::NoEntry) => {
            debug!("No password to delete for server account {server_account}");
            Ok(())
        }
        Err(e) => {
            warn!("Failed to delete password: {e}");
            Err(e.into())
        }
    }
}
