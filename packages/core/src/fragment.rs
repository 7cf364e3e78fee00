//! Fragments: dot-separated key paths inside a container.

use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::{Error, Result};

/// Characters escaped when printing a fragment key.
const KEY_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'.')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A path of keys inside a container, written `#foo.0.bar`.
///
/// Keys are stored decoded. Array positions are plain decimal keys; whether a
/// key addresses an object member or an array element is decided by the
/// container it is applied to.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Fragment {
    pub keys: Vec<String>,
}

impl Fragment {
    /// The empty fragment, addressing the container itself.
    pub fn root() -> Self {
        Fragment { keys: Vec::new() }
    }

    /// Parse fragment text, with or without the leading `#`.
    ///
    /// Each `.`-separated segment is percent-decoded, so a key containing a
    /// literal dot must be written `%2E`.
    ///
    /// ```rust
    /// use urlstore_core::Fragment;
    ///
    /// let f = Fragment::parse("#users.0.first%2Ename").unwrap();
    /// assert_eq!(f.keys, vec!["users", "0", "first.name"]);
    /// assert_eq!(f.to_string(), "users.0.first%2Ename");
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.strip_prefix('#').unwrap_or(s);
        if s.is_empty() {
            return Ok(Fragment::root());
        }

        let keys = s
            .split('.')
            .map(|segment| decode_component(s, segment))
            .collect::<Result<Vec<_>>>()?;
        Ok(Fragment { keys })
    }

    /// Build a fragment from already-decoded keys.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Fragment {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.keys.iter()
    }

    /// The final key, if any.
    pub fn last(&self) -> Option<&str> {
        self.keys.last().map(String::as_str)
    }

    /// Split into the parent fragment and the final key.
    pub fn split_last(&self) -> Option<(Fragment, &str)> {
        let (last, rest) = self.keys.split_last()?;
        Some((Fragment { keys: rest.to_vec() }, last.as_str()))
    }

    /// Append a key.
    pub fn push(&mut self, key: impl Into<String>) {
        self.keys.push(key.into());
    }

    /// Join this fragment with another.
    #[must_use]
    pub fn join(&self, other: &Fragment) -> Fragment {
        let mut keys = self.keys.clone();
        keys.extend(other.keys.iter().cloned());
        Fragment { keys }
    }

    /// Check if this fragment starts with `prefix`.
    pub fn has_prefix(&self, prefix: &Fragment) -> bool {
        prefix.keys.len() <= self.keys.len() && prefix.keys == self.keys[..prefix.keys.len()]
    }

    /// Strip a prefix, returning `None` when it does not match.
    #[must_use]
    pub fn strip_prefix(&self, prefix: &Fragment) -> Option<Fragment> {
        if self.has_prefix(prefix) {
            Some(Fragment {
                keys: self.keys[prefix.keys.len()..].to_vec(),
            })
        } else {
            None
        }
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", utf8_percent_encode(key, KEY_ENCODE_SET))?;
        }
        Ok(())
    }
}

impl std::ops::Index<usize> for Fragment {
    type Output = String;

    fn index(&self, i: usize) -> &Self::Output {
        &self.keys[i]
    }
}

/// Check that every `%` in `s` starts a two-digit hex escape.
pub(crate) fn has_valid_escapes(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit);
            if !valid {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

/// Percent-decode one URL component, rejecting malformed escapes.
pub fn decode_component(context: &str, component: &str) -> Result<String> {
    if !has_valid_escapes(component) {
        return Err(Error::malformed(
            context,
            format!("invalid percent escape in '{}'", component),
        ));
    }
    percent_decode_str(component)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| Error::malformed(context, format!("'{}' is not valid UTF-8", component)))
}

/// Macro for building fragments from literals in tests and examples.
///
/// ```rust
/// use urlstore_core::fragment;
///
/// let f = fragment!("a.b.0");
/// assert_eq!(f.len(), 3);
/// ```
#[macro_export]
macro_rules! fragment {
    ($s:expr) => {
        $crate::Fragment::parse($s).expect("invalid fragment literal")
    };
}
