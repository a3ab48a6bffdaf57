//! Server account validation.

use super::model::ServerAccountData;
use crate::protocol::{AuthProtocol, ConnectionProtocol, TransportStoreProtocol};

/// Validation error for server account configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Server account name is empty.
    EmptyName,
    /// Protocol is not known.
    UnknownProtocol,
    /// A store account uses a transport protocol.
    NotAStore,
    /// A transport account uses a store protocol.
    NotATransport,
    /// Host is empty for a remote protocol.
    EmptyHostname,
    /// Username is empty while authentication is required.
    EmptyUsername,
    /// Connection security is not known.
    UnknownSecurity,
    /// Authentication mechanism is not known.
    UnknownAuth,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyName => "Server account name is required",
            Self::UnknownProtocol => "Unknown protocol",
            Self::NotAStore => "Protocol cannot retrieve mail",
            Self::NotATransport => "Protocol cannot send mail",
            Self::EmptyHostname => "Server is required",
            Self::EmptyUsername => "Username is required",
            Self::UnknownSecurity => "Unknown connection security",
            Self::UnknownAuth => "Unknown authentication method",
        }
    }

    /// Get the setting this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyName => "name",
            Self::UnknownProtocol | Self::NotAStore | Self::NotATransport => "proto",
            Self::EmptyHostname => "hostname",
            Self::EmptyUsername => "username",
            Self::UnknownSecurity => "security",
            Self::UnknownAuth => "auth_mech",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating a server account.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Role a server account plays for its account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerRole {
    /// Retrieves mail.
    Store,
    /// Sends mail.
    Transport,
}

/// Validate a server account for the given role.
///
/// Returns `Ok(())` if valid, or `Err(Vec<ValidationError>)` with all errors.
///
/// # Errors
///
/// Returns a vector of `ValidationError` if any settings are invalid.
pub fn validate_server_account(data: &ServerAccountData, role: ServerRole) -> ValidationResult {
    let mut errors = Vec::new();

    if data.name.trim().is_empty() {
        errors.push(ValidationError::EmptyName);
    }

    match (data.protocol, role) {
        (TransportStoreProtocol::Unknown, _) => errors.push(ValidationError::UnknownProtocol),
        (p, ServerRole::Store) if !p.is_store() => errors.push(ValidationError::NotAStore),
        (p, ServerRole::Transport) if !p.is_transport() => {
            errors.push(ValidationError::NotATransport);
        }
        _ => {}
    }

    // Local stores and sendmail need no server
    let remote = matches!(
        data.protocol,
        TransportStoreProtocol::Imap | TransportStoreProtocol::Pop | TransportStoreProtocol::Smtp
    );
    if remote {
        if data.hostname.trim().is_empty() {
            errors.push(ValidationError::EmptyHostname);
        }
        if data.security == ConnectionProtocol::Unknown {
            errors.push(ValidationError::UnknownSecurity);
        }
        match data.auth {
            AuthProtocol::Unknown => errors.push(ValidationError::UnknownAuth),
            AuthProtocol::Password | AuthProtocol::CramMd5 if data.username.trim().is_empty() => {
                errors.push(ValidationError::EmptyUsername);
            }
            _ => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
