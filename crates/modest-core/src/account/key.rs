//! Account key namespace codec.
//!
//! Account settings live below `/apps/modest/accounts/<account>/` and
//! server account settings below `/apps/modest/server_accounts/<account>/`.
//! Account names are free-form, so they are escaped into a single legal key
//! segment: every byte outside `[A-Za-z0-9_-]` becomes `@<decimal>@`.

use tracing::warn;

use crate::config::{self, SEPARATOR};

/// Directory holding the regular accounts.
pub const ACCOUNT_NAMESPACE: &str = "/apps/modest/accounts";

/// Directory holding the server (store/transport) accounts.
pub const SERVER_ACCOUNT_NAMESPACE: &str = "/apps/modest/server_accounts";

/// Escape marker.
const ESCAPE: u8 = b'@';

/// An account key split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecomposedKey {
    /// Unescaped account name.
    pub account_name: String,
    /// The key is a setting directly below the account directory.
    pub is_top_level: bool,
    /// The key belongs to a server account.
    pub is_server_account: bool,
}

/// Namespace directory for the account kind.
#[must_use]
pub const fn namespace(is_server_account: bool) -> &'static str {
    if is_server_account {
        SERVER_ACCOUNT_NAMESPACE
    } else {
        ACCOUNT_NAMESPACE
    }
}

/// Escape `segment` so it can be embedded as one key segment.
#[must_use]
pub fn escape(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for b in segment.bytes() {
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' {
            out.push(char::from(b));
        } else {
            out.push(char::from(ESCAPE));
            out.push_str(&b.to_string());
            out.push(char::from(ESCAPE));
        }
    }
    out
}

/// Reverse [`escape`].
///
/// Returns `None` for unterminated or out-of-range escapes, when the
/// decoded bytes are not UTF-8, and for any spelling `escape` would not
/// produce (leading zeros, escaped safe bytes). Each name thus has exactly
/// one encoded form.
#[must_use]
pub fn unescape(segment: &str) -> Option<String> {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == ESCAPE {
            let len = bytes[i + 1..].iter().position(|&b| b == ESCAPE)?;
            let digits = &segment[i + 1..i + 1 + len];
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            out.push(digits.parse::<u8>().ok()?);
            i += len + 2;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    let decoded = String::from_utf8(out).ok()?;
    (escape(&decoded) == segment).then_some(decoded)
}

/// Build the key of an account, or of one of its settings.
///
/// With `setting` set to `None` the bare account directory is returned.
/// Returns `None` if the result is not a legal configuration key, which
/// happens for an empty account name or a malformed setting name.
#[must_use]
pub fn compose(
    account_name: &str,
    setting: Option<&str>,
    is_server_account: bool,
) -> Option<String> {
    let account_dir = config::join(namespace(is_server_account), &escape(account_name));
    let key = match setting {
        Some(setting) => config::join(&account_dir, setting),
        None => account_dir,
    };

    if config::is_valid_key(&key) {
        Some(key)
    } else {
        warn!("Composed an invalid account key: {key:?}");
        None
    }
}

/// Split an account key into account name and key kind.
///
/// Returns `None` when the key is outside both account namespaces or does
/// not name an account.
#[must_use]
pub fn decompose(key: &str) -> Option<DecomposedKey> {
    let (rest, is_server_account) = strip_namespace(key, SERVER_ACCOUNT_NAMESPACE)
        .map(|rest| (rest, true))
        .or_else(|| strip_namespace(key, ACCOUNT_NAMESPACE).map(|rest| (rest, false)))?;

    let mut segments = rest.split(SEPARATOR);
    let account = segments.next().filter(|s| !s.is_empty())?;
    let account_name = unescape(account)?;
    let is_top_level = segments.count() == 1;

    Some(DecomposedKey {
        account_name,
        is_top_level,
        is_server_account,
    })
}

fn strip_namespace<'a>(key: &'a str, namespace: &str) -> Option<&'a str> {
    key.strip_prefix(namespace)?.strip_prefix(SEPARATOR)
}
