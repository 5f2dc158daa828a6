//! Property keys.

use std::fmt;

/// A property key on a target.
///
/// Keys are normalised on construction so that the same logical property
/// always hashes the same way: `"length"` becomes [`Key::Length`] and a
/// canonical decimal integer such as `"3"` becomes [`Key::Index`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A position in an array (or an integer-named record property).
    Index(usize),
    /// The `length` property.
    Length,
    /// Any other named property.
    Name(String),
}

impl Key {
    /// Name of the key a [`Ref`](crate::Ref) is tracked under.
    pub const REF_VALUE: &'static str = "value";

    /// The position this key denotes, if it is an index.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(index) => Some(*index),
            _ => None,
        }
    }

    /// Whether this is the `length` key.
    pub fn is_length(&self) -> bool {
        matches!(self, Key::Length)
    }
}

/// Returns true if `s` round-trips through integer parsing unchanged.
fn is_integer_key(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| b.is_ascii_digit())
        && (s == "0" || !s.starts_with('0'))
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        if s == "length" {
            return Key::Length;
        }
        if is_integer_key(s) {
            if let Ok(index) = s.parse::<usize>() {
                return Key::Index(index);
            }
        }
        Key::Name(s.to_owned())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::from(s.as_str())
    }
}

impl From<&String> for Key {
    fn from(s: &String) -> Self {
        Key::from(s.as_str())
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(index) => write!(f, "{index}"),
            Key::Length => f.write_str("length"),
            Key::Name(name) => f.write_str(name),
        }
    }
}
