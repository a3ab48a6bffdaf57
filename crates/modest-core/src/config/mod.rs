//! Hierarchical configuration storage.
//!
//! Keys are absolute '/'-separated paths such as
//! `/apps/modest/accounts/Work/email`. Values are typed and persisted in a
//! `SQLite` database.

mod store;
mod value;

pub use store::ConfigStore;
pub use value::ConfigValue;

/// Key separator.
pub const SEPARATOR: char = '/';

/// Whether `key` is a legal configuration key.
///
/// A legal key is absolute, has no empty segments, does not end with the
/// separator and only uses ASCII letters, digits, `_`, `-` and `@` inside
/// its segments.
#[must_use]
pub fn is_valid_key(key: &str) -> bool {
    let Some(rest) = key.strip_prefix(SEPARATOR) else {
        return false;
    };
    !rest.is_empty()
        && rest.split(SEPARATOR).all(|segment| {
            !segment.is_empty()
                && segment
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'@'))
        })
}

/// Join a directory and a relative key.
#[must_use]
pub fn join(dir: &str, name: &str) -> String {
    format!("{}{SEPARATOR}{name}", dir.trim_end_matches(SEPARATOR))
}
