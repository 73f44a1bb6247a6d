//! Ordered header collections.
//!
//! STOMP headers are plain `name:value` pairs. Order matters: it is the order
//! they appear on the wire, and when a name repeats the first occurrence wins
//! on lookup. Nothing here normalizes case or deduplicates.

use std::fmt;

/// A single `name:value` header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Header {
    /// Header name, compared byte-for-byte.
    pub name: String,
    /// Header value, taken verbatim (may itself contain `:`).
    pub value: String,
}

impl Header {
    /// Create a header from anything string-like.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.value)
    }
}

/// Insertion-ordered sequence of headers.
///
/// Used both for protocol headers the engine builds (`destination`, `id`,
/// `subscription`, ...) and for opaque caller headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    headers: Vec<Header>,
}

impl HeaderSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self { headers: Vec::new() }
    }

    /// Create an empty set with room for `capacity` headers.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { headers: Vec::with_capacity(capacity) }
    }

    /// First header whose name matches exactly, if any.
    pub fn find(&self, name: &str) -> Option<&Header> {
        self.headers.iter().find(|h| h.name == name)
    }

    /// Value of the first header named `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.find(name).map(|h| h.value.as_str())
    }

    /// Whether any header is named `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Append a header at the end. Duplicates are kept.
    pub fn append(&mut self, header: Header) {
        self.headers.push(header);
    }

    /// Append a `name:value` pair.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.append(Header::new(name, value));
    }

    /// Builder-style [`HeaderSet::push`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Header> {
        self.headers.iter()
    }

    /// Number of headers, duplicates included.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// True when the set holds no headers.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Headers as a slice.
    pub fn as_slice(&self) -> &[Header] {
        &self.headers
    }
}

impl<'a> IntoIterator for &'a HeaderSet {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.headers.iter()
    }
}

impl IntoIterator for HeaderSet {
    type Item = Header;
    type IntoIter = std::vec::IntoIter<Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.headers.into_iter()
    }
}

impl FromIterator<Header> for HeaderSet {
    fn from_iter<I: IntoIterator<Item = Header>>(iter: I) -> Self {
        Self { headers: iter.into_iter().collect() }
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for HeaderSet {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        iter.into_iter().map(|(n, v)| Header::new(n, v)).collect()
    }
}

impl Extend<Header> for HeaderSet {
    fn extend<I: IntoIterator<Item = Header>>(&mut self, iter: I) {
        self.headers.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_returns_first_match() {
        let headers = HeaderSet::new().with("id", "first").with("id", "second");

        assert_eq!(headers.get("id"), Some("first"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let headers = HeaderSet::new().with("Authorization", "token");

        assert!(headers.find("authorization").is_none());
        assert_eq!(headers.get("Authorization"), Some("token"));
    }

    #[test]
    fn preserves_insertion_order() {
        let headers: HeaderSet = [("b", "2"), ("a", "1"), ("c", "3")].into_iter().collect();
        let names: Vec<&str> = headers.iter().map(|h| h.name.as_str()).collect();

        assert_eq!(names, ["b", "a", "c"]);
    }

    #[test]
    fn empty_set_finds_nothing() {
        let headers = HeaderSet::new();

        assert!(headers.is_empty());
        assert!(headers.find("destination").is_none());
    }
}
