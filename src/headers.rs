use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

/// An ordered, case-insensitive collection of HTTP headers.
///
/// API Gateway passes headers as a plain map with whatever casing the client used, e.g. `Content-Type` from
/// one client and `content-type` from another. All lookups here ignore the case of the name. The casing of
/// the first insertion is preserved for output because browsers and API Gateway logs are easier to read that way.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedHeaders {
    /// Lower-case name -> (name as inserted, value)
    inner: IndexMap<String, (String, String)>,
}

impl NormalizedHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `name` ignoring the case of the name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner.get(&name.to_lowercase()).map(|(_, v)| v.as_str())
    }

    /// Inserts or replaces the value. Replacing keeps the original position and casing.
    pub fn set<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        let name = name.into();
        let value = value.into();
        match self.inner.get_mut(&name.to_lowercase()) {
            Some(existing) => existing.1 = value,
            None => {
                self.inner.insert(name.to_lowercase(), (name, value));
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(&name.to_lowercase())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.inner.shift_remove(&name.to_lowercase()).map(|(_, v)| v)
    }

    /// Copies every header from `other` over the existing ones. Same-named headers take the value from `other`.
    pub fn extend(&mut self, other: &NormalizedHeaders) {
        for (name, value) in other.iter() {
            self.set(name, value);
        }
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.values().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Names that differ only in case collapse into one header. Names are applied in sorted order, so the
/// value of the last name in byte order wins (`content-type` over `Content-Type`) and the casing of the first is kept.
impl From<&HashMap<String, String>> for NormalizedHeaders {
    fn from(raw: &HashMap<String, String>) -> Self {
        let mut names = raw.keys().collect::<Vec<_>>();
        names.sort();

        let mut headers = NormalizedHeaders::new();
        for name in names {
            headers.set(name.as_str(), raw[name].as_str());
        }
        headers
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for NormalizedHeaders {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut headers = NormalizedHeaders::new();
        for (name, value) in iter {
            headers.set(name, value);
        }
        headers
    }
}

impl Serialize for NormalizedHeaders {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for NormalizedHeaders {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = IndexMap::<String, String>::deserialize(deserializer)?;
        Ok(raw.into_iter().collect())
    }
}
