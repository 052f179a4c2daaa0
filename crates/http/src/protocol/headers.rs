//! Ordered HTTP header list.
//!
//! Unlike `http::HeaderMap`, [`Headers`] keeps every entry in the exact order it
//! was added, including interleaved duplicates, so a serialized message emits its
//! header lines in insertion order. Name lookups are case-insensitive.

use http::{HeaderName, HeaderValue};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(HeaderName, HeaderValue)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Vec::with_capacity(capacity) }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds an entry at the end, keeping any existing entries with the same name
    pub fn append(&mut self, name: HeaderName, value: HeaderValue) {
        self.entries.push((name, value));
    }

    /// Sets `name` to a single `value`.
    ///
    /// The first existing entry keeps its position and gets the new value, later
    /// duplicates are dropped. Without an existing entry this behaves as [`Headers::append`].
    pub fn insert(&mut self, name: HeaderName, value: HeaderValue) {
        match self.entries.iter().position(|(n, _)| *n == name) {
            Some(index) => {
                self.entries[index].1 = value;
                let mut current = 0;
                self.entries.retain(|(n, _)| {
                    let keep = current <= index || *n != name;
                    current += 1;
                    keep
                });
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Removes every entry named `name`, returning how many were removed
    pub fn remove<K: AsRef<str>>(&mut self, name: K) -> usize {
        let name = name.as_ref();
        let before = self.entries.len();
        self.entries.retain(|(n, _)| n != name);
        before - self.entries.len()
    }

    /// The first value of `name`
    pub fn get<K: AsRef<str>>(&self, name: K) -> Option<&HeaderValue> {
        let name = name.as_ref();
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_all<K: AsRef<str>>(&self, name: K) -> impl Iterator<Item = &HeaderValue> {
        let name = name.as_ref().to_ascii_lowercase();
        self.entries.iter().filter(move |(n, _)| n == name.as_str()).map(|(_, v)| v)
    }

    pub fn contains<K: AsRef<str>>(&self, name: K) -> bool {
        self.get(name).is_some()
    }

    /// Checks whether any value of `name`, read as a comma separated list, holds `token`
    ///
    /// The comparison ignores ASCII case, which is what `Connection` and
    /// `Transfer-Encoding` need.
    pub fn contains_token<K: AsRef<str>>(&self, name: K, token: &str) -> bool {
        self.get_all(name)
            .flat_map(|value| value.as_bytes().split(|b| *b == b','))
            .any(|item| item.trim_ascii().eq_ignore_ascii_case(token.as_bytes()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.entries.iter().map(|(n, v)| (n, v))
    }
}

impl FromIterator<(HeaderName, HeaderValue)> for Headers {
    fn from_iter<T: IntoIterator<Item = (HeaderName, HeaderValue)>>(iter: T) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

impl Extend<(HeaderName, HeaderValue)> for Headers {
    fn extend<T: IntoIterator<Item = (HeaderName, HeaderValue)>>(&mut self, iter: T) {
        self.entries.extend(iter);
    }
}

impl IntoIterator for Headers {
    type Item = (HeaderName, HeaderValue);
    type IntoIter = std::vec::IntoIter<(HeaderName, HeaderValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use http::header::{CONNECTION, CONTENT_LENGTH, SET_COOKIE};

    use super::*;

    fn name(s: &'static str) -> HeaderName {
        HeaderName::from_static(s)
    }

    #[test]
    fn keeps_insertion_order_with_duplicates() {
        let mut headers = Headers::new();
        headers.append(name("x-b"), HeaderValue::from_static("1"));
        headers.append(name("x-a"), HeaderValue::from_static("2"));
        headers.append(name("x-b"), HeaderValue::from_static("3"));

        let lines: Vec<_> = headers.iter().map(|(n, v)| format!("{}={}", n, v.to_str().unwrap())).collect();
        assert_eq!(lines, vec!["x-b=1", "x-a=2", "x-b=3"]);
        assert_eq!(headers.get_all("X-B").count(), 2);
    }

    #[test]
    fn lookup_ignores_case() {
        let mut headers = Headers::new();
        headers.append(CONTENT_LENGTH, HeaderValue::from(12_u64));

        assert_eq!(headers.get("Content-Length"), Some(&HeaderValue::from_static("12")));
        assert!(headers.contains(CONTENT_LENGTH));
        assert!(!headers.contains(SET_COOKIE));
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut headers = Headers::new();
        headers.append(name("x-a"), HeaderValue::from_static("1"));
        headers.append(name("x-b"), HeaderValue::from_static("2"));
        headers.append(name("x-a"), HeaderValue::from_static("3"));

        headers.insert(name("x-a"), HeaderValue::from_static("4"));

        let lines: Vec<_> = headers.iter().map(|(n, v)| format!("{}={}", n, v.to_str().unwrap())).collect();
        assert_eq!(lines, vec!["x-a=4", "x-b=2"]);
    }

    #[test]
    fn remove_all_of_a_name() {
        let mut headers = Headers::new();
        headers.append(name("x-a"), HeaderValue::from_static("1"));
        headers.append(name("x-a"), HeaderValue::from_static("2"));
        assert_eq!(headers.remove("X-A"), 2);
        assert!(headers.is_empty());
    }

    #[test]
    fn finds_connection_tokens() {
        let mut headers = Headers::new();
        headers.append(CONNECTION, HeaderValue::from_static("Upgrade, Keep-Alive"));

        assert!(headers.contains_token(CONNECTION, "keep-alive"));
        assert!(headers.contains_token("connection", "upgrade"));
        assert!(!headers.contains_token(CONNECTION, "close"));
    }
}
