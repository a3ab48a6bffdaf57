//! Account management module.
//!
//! Provides the account key codec, account configuration, credential
//! storage and validation.

pub mod credentials;
pub mod key;
mod manager;
mod model;
mod validation;

pub use credentials::{CredentialError, CredentialResult};
pub use key::{DecomposedKey, compose, decompose};
pub use manager::{AccountManager, DEFAULT_ACCOUNT_KEY};
pub use model::{AccountData, ServerAccountData, settings};
pub use validation::{ServerRole, ValidationError, ValidationResult, validate_server_account};
