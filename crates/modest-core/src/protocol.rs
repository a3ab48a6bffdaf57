//! Protocol registry.
//!
//! Maps the protocol tokens stored in account configuration to typed
//! protocol identifiers and human-readable labels. Three independent tables
//! exist: transport/store protocols, connection security and authentication.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Common lookups shared by every protocol table.
pub trait ProtocolInfo: Sized + Copy + Eq + 'static {
    /// Sentinel returned for tokens that are not in the table.
    const UNKNOWN: Self;

    /// Every known protocol in table order (the sentinel is not included).
    const ALL: &'static [Self];

    /// Stable configuration token.
    fn name(self) -> &'static str;

    /// Human-readable label.
    fn display_name(self) -> &'static str;

    /// Looks up a protocol by its configuration token.
    ///
    /// Matching is case-insensitive. Tokens that are not in the table yield
    /// [`Self::UNKNOWN`].
    fn from_name(name: &str) -> Self {
        let name = name.trim();
        if let Some(found) = Self::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(name))
        {
            return found;
        }
        debug!("Unknown protocol name: {name:?}");
        Self::UNKNOWN
    }

    /// Iterate over the known protocols of this table.
    fn all() -> std::iter::Copied<std::slice::Iter<'static, Self>> {
        Self::ALL.iter().copied()
    }
}

/// Account-side protocol used to store or send mail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransportStoreProtocol {
    /// Not a known protocol.
    #[default]
    Unknown,
    /// Local sendmail binary.
    Sendmail,
    /// SMTP server.
    Smtp,
    /// POP3 server.
    Pop,
    /// IMAP server.
    Imap,
    /// Local Maildir tree.
    Maildir,
    /// Local mbox file.
    MBox,
}

impl TransportStoreProtocol {
    /// Whether the protocol retrieves mail (local or remote).
    #[must_use]
    pub const fn is_store(self) -> bool {
        matches!(self, Self::Maildir | Self::MBox | Self::Pop | Self::Imap)
    }

    /// Whether the protocol is a store kept on the local disk.
    #[must_use]
    pub const fn is_local_store(self) -> bool {
        matches!(self, Self::Maildir | Self::MBox)
    }

    /// Whether the protocol sends mail.
    #[must_use]
    pub const fn is_transport(self) -> bool {
        matches!(self, Self::Smtp | Self::Sendmail)
    }

    /// Default server port for the protocol and connection security.
    ///
    /// Local protocols (and sendmail) have no port.
    #[must_use]
    pub const fn default_port(self, security: ConnectionProtocol) -> Option<u16> {
        let ssl = matches!(security, ConnectionProtocol::Ssl);
        match self {
            Self::Imap => Some(if ssl { 993 } else { 143 }),
            Self::Pop => Some(if ssl { 995 } else { 110 }),
            Self::Smtp => Some(if ssl { 465 } else { 25 }),
            Self::Unknown | Self::Sendmail | Self::Maildir | Self::MBox => None,
        }
    }
}

impl ProtocolInfo for TransportStoreProtocol {
    const UNKNOWN: Self = Self::Unknown;
    const ALL: &'static [Self] = &[
        Self::Sendmail,
        Self::Smtp,
        Self::Pop,
        Self::Imap,
        Self::Maildir,
        Self::MBox,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Sendmail => "sendmail",
            Self::Smtp => "smtp",
            Self::Pop => "pop",
            Self::Imap => "imap",
            Self::Maildir => "maildir",
            Self::MBox => "mbox",
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Sendmail => "Sendmail",
            Self::Smtp => "SMTP Server",
            Self::Pop => "POP3",
            Self::Imap => "IMAPv4",
            Self::Maildir => "Maildir",
            Self::MBox => "MBox",
        }
    }
}

/// Security of the connection to a mail server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionProtocol {
    /// Not a known protocol.
    #[default]
    Unknown,
    /// Plain text connection.
    None,
    /// Implicit TLS on a dedicated port.
    Ssl,
    /// STARTTLS upgrade, required.
    Tls,
    /// STARTTLS upgrade when the server offers it.
    TlsOptional,
}

impl ProtocolInfo for ConnectionProtocol {
    const UNKNOWN: Self = Self::Unknown;
    const ALL: &'static [Self] = &[Self::None, Self::Ssl, Self::Tls, Self::TlsOptional];

    fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::None => "none",
            Self::Ssl => "ssl",
            Self::Tls => "tls",
            Self::TlsOptional => "tls-op",
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::None => "None",
            Self::Ssl => "SSL",
            Self::Tls => "TLS",
            Self::TlsOptional => "TLS when possible",
        }
    }
}

/// Authentication mechanism used with a mail server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AuthProtocol {
    /// Not a known protocol.
    #[default]
    Unknown,
    /// No authentication.
    None,
    /// Plain password.
    Password,
    /// CRAM-MD5 challenge/response.
    CramMd5,
}

impl ProtocolInfo for AuthProtocol {
    const UNKNOWN: Self = Self::Unknown;
    const ALL: &'static [Self] = &[Self::None, Self::Password, Self::CramMd5];

    fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::None => "none",
            Self::Password => "password",
            Self::CramMd5 => "cram-md5",
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::None => "None",
            Self::Password => "Password",
            Self::CramMd5 => "CRAM-MD5",
        }
    }
}
