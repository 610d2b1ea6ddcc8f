// ABOUTME: Ordered key/value header store shared by outbound frame construction and inbound parsing
// ABOUTME: Preserves insertion order and first-match lookup semantics required by the STOMP wire format

/// A single STOMP header: an unescaped `(key, value)` pair.
///
/// Both sides are arbitrary byte-compatible strings that exclude `NUL`. Escaping for the wire
/// (`\r`, `\n`, `:`, `\`) is applied by the frame codec, never stored pre-escaped here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub key: String,
    pub value: String,
}

impl Header {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl<K, V> From<(K, V)> for Header
where
    K: Into<String>,
    V: Into<String>,
{
    fn from((key, value): (K, V)) -> Self {
        Header::new(key, value)
    }
}

/// Ordered sequence of headers with first-match lookup.
///
/// Order is preserved on the wire in both directions; duplicate keys are legal on frames
/// received from a broker, and `get` returns the first occurrence, matching `frame_hdr_get`
/// in the reference implementation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderStore {
    headers: Vec<Header>,
}

impl HeaderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, header: Header) {
        self.headers.push(header);
    }

    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.push(Header::new(key, value));
    }

    /// Returns the value of the first header matching `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.key == key)
            .map(|h| h.value.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.headers.iter()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn clear(&mut self) {
        self.headers.clear();
    }
}

impl<'a> IntoIterator for &'a HeaderStore {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.headers.iter()
    }
}

impl FromIterator<Header> for HeaderStore {
    fn from_iter<T: IntoIterator<Item = Header>>(iter: T) -> Self {
        Self {
            headers: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_match_wins_on_lookup() {
        let mut store = HeaderStore::new();
        store.add("destination", "/queue/a");
        store.add("destination", "/queue/b");
        assert_eq!(store.get("destination"), Some("/queue/a"));
    }

    #[test]
    fn missing_key_returns_none() {
        let store = HeaderStore::new();
        assert_eq!(store.get("absent"), None);
    }

    #[test]
    fn preserves_insertion_order() {
        let mut store = HeaderStore::new();
        store.add("a", "1");
        store.add("b", "2");
        let keys: Vec<_> = store.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
