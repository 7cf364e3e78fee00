//! URL parsing, printing and relative resolution.
//!
//! URLs here follow `scheme:[//authority]path[?query][#fragment]`. Each
//! component keeps its raw text so that printing a parsed URL reproduces the
//! input exactly.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{Error, Result};
use crate::fragment::{decode_component, has_valid_escapes, Fragment};

/// Scheme of the in-memory root store.
pub const MEMORY_SCHEME: &str = "mem";

/// A scheme as written. Schemes compare case-insensitively.
#[derive(Clone, Debug)]
struct Scheme {
    name: String,
    written: String,
}

impl Scheme {
    fn new(written: &str) -> Self {
        Scheme {
            name: written.to_ascii_lowercase(),
            written: written.to_string(),
        }
    }
}

impl PartialEq for Scheme {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Scheme {}

impl Hash for Scheme {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// A parsed URL.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Url {
    scheme: Option<Scheme>,
    authority: Option<String>,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl Url {
    /// Parse a URL or relative reference.
    ///
    /// ```rust
    /// use urlstore_core::Url;
    ///
    /// let url = Url::parse("mem:/users?keys#0.name").unwrap();
    /// assert_eq!(url.scheme(), Some("mem"));
    /// assert_eq!(url.path(), "/users");
    /// assert_eq!(url.query(), Some("keys"));
    /// assert_eq!(url.fragment(), Some("0.name"));
    /// assert_eq!(url.to_string(), "mem:/users?keys#0.name");
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let (rest, fragment) = match s.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment)),
            None => (s, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (rest, None),
        };

        let (scheme, rest) = split_scheme(s, rest)?;

        let (authority, path) = match rest.strip_prefix("//") {
            Some(after) => {
                let end = after.find('/').unwrap_or(after.len());
                (Some(&after[..end]), &after[end..])
            }
            None => (None, rest),
        };

        for component in [authority, Some(path), query, fragment].into_iter().flatten() {
            if !has_valid_escapes(component) {
                return Err(Error::malformed(s, "invalid percent escape"));
            }
        }
        if let Some(query) = query {
            Query::parse(query).map_err(|e| match e {
                Error::MalformedUrl { message, .. } => Error::malformed(s, message),
                other => other,
            })?;
        }

        Ok(Url {
            scheme: scheme.map(Scheme::new),
            authority: authority.map(str::to_string),
            path: path.to_string(),
            query: query.map(str::to_string),
            fragment: fragment.map(str::to_string),
        })
    }

    /// The root of the in-memory store, `mem:/`.
    pub fn memory_root() -> Self {
        Url {
            scheme: Some(Scheme::new(MEMORY_SCHEME)),
            path: "/".to_string(),
            ..Url::default()
        }
    }

    /// The scheme, lowercased.
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_ref().map(|scheme| scheme.name.as_str())
    }

    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    /// The raw (still percent-encoded) path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw query text without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// The raw fragment text without the leading `#`.
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// A URL without a scheme must be resolved against a base.
    pub fn is_relative(&self) -> bool {
        self.scheme.is_none()
    }

    /// Check whether this URL uses the in-memory scheme.
    pub fn is_memory(&self) -> bool {
        self.scheme() == Some(MEMORY_SCHEME)
    }

    /// Check whether this URL is only a fragment (`#a.b`).
    pub fn is_fragment_only(&self) -> bool {
        self.scheme.is_none()
            && self.authority.is_none()
            && self.path.is_empty()
            && self.query.is_none()
            && self.fragment.is_some()
    }

    /// The percent-decoded path.
    pub fn decoded_path(&self) -> Result<String> {
        decode_component(&self.to_string(), &self.path)
    }

    /// The decoded, non-empty path segments.
    pub fn path_segments(&self) -> Result<Vec<String>> {
        self.path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| decode_component(&self.path, s))
            .collect()
    }

    /// Parse the fragment into keys, if the URL has one.
    pub fn fragment_path(&self) -> Result<Option<Fragment>> {
        self.fragment.as_deref().map(Fragment::parse).transpose()
    }

    /// Parse the query parameters, if the URL has a query.
    pub fn query_params(&self) -> Result<Option<Query>> {
        self.query.as_deref().map(Query::parse).transpose()
    }

    /// A copy of this URL without its fragment.
    #[must_use]
    pub fn without_fragment(&self) -> Url {
        Url {
            fragment: None,
            ..self.clone()
        }
    }

    /// A copy of this URL without its query.
    #[must_use]
    pub fn without_query(&self) -> Url {
        Url {
            query: None,
            ..self.clone()
        }
    }

    /// A copy of this URL with its fragment replaced.
    #[must_use]
    pub fn with_fragment(&self, fragment: &Fragment) -> Url {
        Url {
            fragment: Some(fragment.to_string()),
            ..self.clone()
        }
    }

    /// A copy of this URL with a query replacing the current one.
    #[must_use]
    pub fn with_query(&self, query: impl Into<String>) -> Url {
        Url {
            query: Some(query.into()),
            ..self.clone()
        }
    }

    /// Resolve a reference string against this URL.
    ///
    /// ```rust
    /// use urlstore_core::Url;
    ///
    /// let base = Url::parse("mem:/docs/guide/intro").unwrap();
    /// assert_eq!(base.join("../api").unwrap().to_string(), "mem:/docs/api");
    /// assert_eq!(base.join("#toc").unwrap().to_string(), "mem:/docs/guide/intro#toc");
    /// ```
    pub fn join(&self, reference: &str) -> Result<Url> {
        Ok(self.resolve(&Url::parse(reference)?))
    }

    /// Resolve a parsed reference against this URL (RFC 3986 section 5.2).
    #[must_use]
    pub fn resolve(&self, reference: &Url) -> Url {
        if reference.scheme.is_some() {
            return Url {
                path: remove_dot_segments(&reference.path),
                ..reference.clone()
            };
        }

        let (authority, path, query) = if reference.authority.is_some() {
            (
                reference.authority.clone(),
                remove_dot_segments(&reference.path),
                reference.query.clone(),
            )
        } else if reference.path.is_empty() {
            (
                self.authority.clone(),
                self.path.clone(),
                reference.query.clone().or_else(|| self.query.clone()),
            )
        } else if reference.path.starts_with('/') {
            (
                self.authority.clone(),
                remove_dot_segments(&reference.path),
                reference.query.clone(),
            )
        } else {
            (
                self.authority.clone(),
                remove_dot_segments(&self.merge(&reference.path)),
                reference.query.clone(),
            )
        };

        Url {
            scheme: self.scheme.clone(),
            authority,
            path,
            query,
            fragment: reference.fragment.clone(),
        }
    }

    fn merge(&self, reference_path: &str) -> String {
        if self.authority.is_some() && self.path.is_empty() {
            return format!("/{}", reference_path);
        }
        match self.path.rfind('/') {
            Some(i) => format!("{}{}", &self.path[..=i], reference_path),
            None => reference_path.to_string(),
        }
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scheme) = &self.scheme {
            write!(f, "{}:", scheme.written)?;
        }
        if let Some(authority) = &self.authority {
            write!(f, "//{}", authority)?;
        }
        f.write_str(&self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{}", query)?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{}", fragment)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Url {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Url::parse(s)
    }
}

fn split_scheme<'a>(whole: &str, rest: &'a str) -> Result<(Option<&'a str>, &'a str)> {
    let Some(colon) = rest.find(':') else {
        return Ok((None, rest));
    };
    let candidate = &rest[..colon];
    if candidate.contains('/') {
        return Ok((None, rest));
    }
    if candidate.is_empty() {
        return Err(Error::malformed(whole, "empty scheme"));
    }
    let mut chars = candidate.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid {
        // A colon in the first segment of a relative path, e.g. "a b:c".
        return Ok((None, rest));
    }
    Ok((Some(candidate), &rest[colon + 1..]))
}

fn remove_dot_segments(path: &str) -> String {
    let mut input = path.to_string();
    let mut output = String::with_capacity(path.len());

    while !input.is_empty() {
        if input.starts_with("../") {
            input.drain(..3);
        } else if input.starts_with("./") {
            input.drain(..2);
        } else if input.starts_with("/./") {
            input.replace_range(..3, "/");
        } else if input == "/." {
            input = "/".to_string();
        } else if input.starts_with("/../") {
            input.replace_range(..4, "/");
            pop_segment(&mut output);
        } else if input == "/.." {
            input = "/".to_string();
            pop_segment(&mut output);
        } else if input == "." || input == ".." {
            input.clear();
        } else {
            let start = usize::from(input.starts_with('/'));
            let end = input[start..]
                .find('/')
                .map(|i| i + start)
                .unwrap_or(input.len());
            output.push_str(&input[..end]);
            input.drain(..end);
        }
    }

    output
}

fn pop_segment(output: &mut String) {
    match output.rfind('/') {
        Some(i) => output.truncate(i),
        None => output.clear(),
    }
}

/// Which browse operation a query asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrowseKind {
    CountItems,
    PagedItems,
    PagedKeys,
    Keys,
}

/// Parsed query parameters.
///
/// Reserved keys select connector operations; other keys are carried along
/// untouched, so `?keys&sort=name` is still a keys query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    params: Vec<(String, Option<String>)>,
}

impl Query {
    pub const COUNT_ITEMS: &'static str = "countItems";
    pub const KEYS: &'static str = "keys";
    pub const PAGED_ITEMS: &'static str = "pagedItems";
    pub const PAGED_KEYS: &'static str = "pagedKeys";
    pub const START_ROW: &'static str = "startRow";
    pub const NUM_ROWS: &'static str = "numRows";
    pub const LOAD: &'static str = "load";
    pub const DUMP: &'static str = "dump";
    pub const QUERY: &'static str = "query";

    /// Parse raw query text (without the `?`).
    pub fn parse(raw: &str) -> Result<Self> {
        let mut params = Vec::new();
        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = match pair.split_once('=') {
                Some((k, v)) => (k, Some(v)),
                None => (pair, None),
            };
            check_brackets(raw, key)?;
            let key = decode_component(raw, key)?;
            let value = value.map(|v| decode_component(raw, v)).transpose()?;
            params.push((key, value));
        }
        Ok(Query { params })
    }

    /// Check whether a parameter is present, with or without a value.
    pub fn contains(&self, key: &str) -> bool {
        self.params.iter().any(|(k, _)| k == key)
    }

    /// The first value of a parameter; a bare key yields `Some("")`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref().unwrap_or(""))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn is_count_items_query(&self) -> bool {
        self.contains(Self::COUNT_ITEMS)
    }

    pub fn is_keys_query(&self) -> bool {
        self.contains(Self::KEYS)
    }

    pub fn is_paged_items_query(&self) -> bool {
        self.contains(Self::PAGED_ITEMS)
    }

    pub fn is_paged_keys_query(&self) -> bool {
        self.contains(Self::PAGED_KEYS)
    }

    pub fn is_load_query(&self) -> bool {
        self.contains(Self::LOAD)
    }

    pub fn is_dump_query(&self) -> bool {
        self.contains(Self::DUMP)
    }

    pub fn is_generic_query(&self) -> bool {
        self.contains(Self::QUERY)
    }

    /// The browse operation requested, in precedence order
    /// countItems, pagedItems, pagedKeys, keys.
    pub fn browse_kind(&self) -> Option<BrowseKind> {
        if self.is_count_items_query() {
            Some(BrowseKind::CountItems)
        } else if self.is_paged_items_query() {
            Some(BrowseKind::PagedItems)
        } else if self.is_paged_keys_query() {
            Some(BrowseKind::PagedKeys)
        } else if self.is_keys_query() {
            Some(BrowseKind::Keys)
        } else {
            None
        }
    }

    /// The first row of a page; defaults to 0.
    pub fn start_row(&self) -> Result<usize> {
        Ok(self.number(Self::START_ROW)?.unwrap_or(0))
    }

    /// The number of rows in a page; `None` means "to the end".
    pub fn num_rows(&self) -> Result<Option<usize>> {
        self.number(Self::NUM_ROWS)
    }

    fn number(&self, key: &str) -> Result<Option<usize>> {
        match self.get(key) {
            None | Some("") => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|_| {
                Error::malformed(
                    format!("{}={}", key, raw),
                    format!("'{}' must be a non-negative integer", key),
                )
            }),
        }
    }
}

fn check_brackets(raw: &str, key: &str) -> Result<()> {
    let mut open = false;
    for c in key.chars() {
        match c {
            '[' if open => {
                return Err(Error::malformed(raw, format!("nested '[' in key '{}'", key)))
            }
            '[' => open = true,
            ']' if !open => {
                return Err(Error::malformed(raw, format!("unmatched ']' in key '{}'", key)))
            }
            ']' => open = false,
            _ => {}
        }
    }
    if open {
        return Err(Error::malformed(
            raw,
            format!("unterminated '[' in key '{}'", key),
        ));
    }
    Ok(())
}
