//! Account model types.

use serde::{Deserialize, Serialize};

use crate::protocol::{AuthProtocol, ConnectionProtocol, TransportStoreProtocol};

/// Setting names used below an account directory.
pub mod settings {
    /// Name shown to the user.
    pub const DISPLAY_NAME: &str = "display_name";
    /// Full name of the account owner.
    pub const FULLNAME: &str = "fullname";
    /// Sender address.
    pub const EMAIL: &str = "email";
    /// Whether the account is in use.
    pub const ENABLED: &str = "enabled";
    /// Name of the server account used to retrieve mail.
    pub const STORE_ACCOUNT: &str = "store_account";
    /// Name of the server account used to send mail.
    pub const TRANSPORT_ACCOUNT: &str = "transport_account";
    /// Keep retrieved messages on a POP server.
    pub const LEAVE_ON_SERVER: &str = "leave_on_server";
    /// Unix time of the last successful update.
    pub const LAST_UPDATED: &str = "last_updated";

    /// Server host name.
    pub const HOSTNAME: &str = "hostname";
    /// Login name.
    pub const USERNAME: &str = "username";
    /// Protocol token.
    pub const PROTO: &str = "proto";
    /// Server port.
    pub const PORT: &str = "port";
    /// Connection security token.
    pub const SECURITY: &str = "security";
    /// Authentication mechanism token.
    pub const AUTH_MECH: &str = "auth_mech";
}

/// Connection settings of a store or transport server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerAccountData {
    /// Server account name.
    pub name: String,
    /// Server hostname (empty for local protocols).
    pub hostname: String,
    /// Username for authentication.
    pub username: String,
    /// Store or transport protocol.
    pub protocol: TransportStoreProtocol,
    /// Server port (0 selects the protocol default).
    pub port: u16,
    /// Connection security.
    pub security: ConnectionProtocol,
    /// Authentication mechanism.
    pub auth: AuthProtocol,
}

impl ServerAccountData {
    /// Create server account data with the protocol's default settings.
    #[must_use]
    pub fn new(name: &str, protocol: TransportStoreProtocol, hostname: &str) -> Self {
        Self {
            name: name.to_string(),
            hostname: hostname.to_string(),
            protocol,
            security: ConnectionProtocol::None,
            auth: if protocol.is_local_store() {
                AuthProtocol::None
            } else {
                AuthProtocol::Password
            },
            ..Default::default()
        }
    }

    /// Port to connect to, falling back to the protocol default.
    #[must_use]
    pub fn effective_port(&self) -> Option<u16> {
        if self.port == 0 {
            self.protocol.default_port(self.security)
        } else {
            Some(self.port)
        }
    }
}

/// A configured mail account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountData {
    /// Account name (the configuration key segment, unescaped).
    pub name: String,
    /// Name shown to the user.
    pub display_name: String,
    /// Full name of the owner.
    pub fullname: String,
    /// Sender address.
    pub email: String,
    /// Whether the account is in use.
    pub enabled: bool,
    /// Server account used to retrieve mail.
    pub store_account: Option<ServerAccountData>,
    /// Server account used to send mail.
    pub transport_account: Option<ServerAccountData>,
}
