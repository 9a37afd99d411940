//! # Query Parameters
//!
//! The parsed query string of one request. Bracketed keys build nested
//! mappings, so `price[gte]=500` becomes `price -> {gte: "500"}`.

use std::collections::BTreeMap;

/// One parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    /// Plain text value
    Text(String),

    /// Nested mapping from bracket syntax
    Nested(BTreeMap<String, QueryValue>),
}

impl QueryValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            QueryValue::Text(s) => Some(s),
            QueryValue::Nested(_) => None,
        }
    }

    fn insert_path(&mut self, path: &[String], value: String) {
        let Some((head, rest)) = path.split_first() else {
            *self = QueryValue::Text(value);
            return;
        };

        if !matches!(self, QueryValue::Nested(_)) {
            *self = QueryValue::Nested(BTreeMap::new());
        }
        if let QueryValue::Nested(map) = self {
            map.entry(head.clone())
                .or_insert_with(|| QueryValue::Nested(BTreeMap::new()))
                .insert_path(rest, value);
        }
    }
}

/// Parameter name to value. Never modified once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySpec {
    params: BTreeMap<String, QueryValue>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from decoded `key=value` pairs. When a key repeats, the last
    /// occurrence wins.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params: BTreeMap<String, QueryValue> = BTreeMap::new();

        for (key, value) in pairs {
            let (name, path) = split_key(key.as_ref());
            params
                .entry(name)
                .or_insert_with(|| QueryValue::Text(String::new()))
                .insert_path(&path, value.into());
        }

        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.params.get(key)
    }

    /// Text value of a parameter; `None` when absent or nested
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(QueryValue::as_text)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &QueryValue)> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for QuerySpec {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

/// Split `price[gte]` into `("price", ["gte"])`. Keys that are not well
/// formed bracket paths are taken literally.
fn split_key(key: &str) -> (String, Vec<String>) {
    let Some(open) = key.find('[') else {
        return (key.to_string(), Vec::new());
    };
    if open == 0 || !key.ends_with(']') {
        return (key.to_string(), Vec::new());
    }

    let name = &key[..open];
    let mut path = Vec::new();
    let mut rest = &key[open..];

    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            return (key.to_string(), Vec::new());
        };
        let segment = &stripped[..close];
        if segment.is_empty() || segment.contains('[') {
            return (key.to_string(), Vec::new());
        }
        path.push(segment.to_string());
        rest = &stripped[close + 1..];
    }

    if !rest.is_empty() {
        return (key.to_string(), Vec::new());
    }

    (name.to_string(), path)
}
