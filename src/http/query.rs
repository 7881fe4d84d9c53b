//! Query string building
//!
//! A [`Query`] is an ordered list of key/value entries. Entries with an
//! absent value are dropped when encoding, the rest are percent-encoded
//! with the query element rules and joined with `&` in input order.

use super::encoding::{encode_query_bytes, encode_query_element};
use super::{Error, Result};
use serde_json::Value;
use std::borrow::Cow;

/// A single query parameter value
///
/// The input kind is explicit so coercion to bytes happens in one place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    /// No value; the entry is omitted from the query string
    Absent,
    /// UTF-8 text
    Text(String),
    /// Raw bytes, percent-encoded as they are
    Bytes(Vec<u8>),
    /// A sequence, either expanded into repeated keys or rendered comma-joined
    List(Vec<QueryValue>),
}

impl QueryValue {
    /// Raw bytes value
    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        QueryValue::Bytes(value.into())
    }

    /// Whether this value is absent
    pub fn is_absent(&self) -> bool {
        matches!(self, QueryValue::Absent)
    }

    /// The string form of a non-sequence value, or comma-joined elements of a list
    fn as_raw(&self) -> Cow<'_, [u8]> {
        match self {
            QueryValue::Absent => Cow::Borrowed(&[]),
            QueryValue::Text(s) => Cow::Borrowed(s.as_bytes()),
            QueryValue::Bytes(b) => Cow::Borrowed(b),
            QueryValue::List(items) => {
                let mut out = Vec::new();
                for (i, item) in items.iter().filter(|v| !v.is_absent()).enumerate() {
                    if i > 0 {
                        out.push(b',');
                    }
                    out.extend_from_slice(&item.as_raw());
                }
                Cow::Owned(out)
            }
        }
    }

    fn encoded(&self) -> String {
        match self {
            QueryValue::Text(s) => encode_query_element(s),
            other => encode_query_bytes(&other.as_raw()),
        }
    }

    /// Convert a JSON value; `null` is absent, scalars use their text form
    fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => QueryValue::Absent,
            Value::String(s) => QueryValue::Text(s.clone()),
            Value::Bool(b) => QueryValue::Text(b.to_string()),
            Value::Number(n) => QueryValue::Text(n.to_string()),
            Value::Array(items) => QueryValue::List(items.iter().map(QueryValue::from_json).collect()),
            Value::Object(_) => QueryValue::Text(value.to_string()),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(s: &str) -> Self {
        QueryValue::Text(s.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(s: String) -> Self {
        QueryValue::Text(s)
    }
}

impl From<&String> for QueryValue {
    fn from(s: &String) -> Self {
        QueryValue::Text(s.clone())
    }
}

macro_rules! query_value_from_display {
    ($($t:ty),*) => {
        $(
            impl From<$t> for QueryValue {
                fn from(v: $t) -> Self {
                    QueryValue::Text(v.to_string())
                }
            }
        )*
    };
}

query_value_from_display!(i32, i64, u32, u64, usize, bool);

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(QueryValue::Absent)
    }
}

impl<T: Into<QueryValue>> From<Vec<T>> for QueryValue {
    fn from(v: Vec<T>) -> Self {
        QueryValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// Ordered query parameters
///
/// Built either from a mapping (keys unique) or from a pair sequence
/// (keys may repeat). No sorting is ever applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    entries: Vec<(String, QueryValue)>,
}

impl Query {
    /// Create an empty query
    pub fn new() -> Self {
        Query {
            entries: Vec::new(),
        }
    }

    /// Build from an ordered pair sequence; repeated keys are kept
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<QueryValue>,
    {
        Query {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Build from a mapping, in the mapping's iteration order
    ///
    /// A key seen twice keeps its first position and takes the later value.
    pub fn from_mapping<I, K, V>(mapping: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<QueryValue>,
    {
        let mut query = Query::new();
        for (k, v) in mapping {
            query.set(k, v);
        }
        query
    }

    /// Build from a JSON value
    ///
    /// Objects are mappings and arrays of `[key, value]` arrays are pair
    /// sequences. Any other top-level value fails with `InvalidQueryInput`.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Query::from_mapping(
                map.iter().map(|(k, v)| (k.clone(), QueryValue::from_json(v))),
            )),
            Value::Array(items) => {
                let mut query = Query::new();
                for item in items {
                    let (key, val) = match item.as_array().map(Vec::as_slice) {
                        Some([key, val]) => (key, val),
                        _ => {
                            return Err(Error::InvalidQueryInput(format!(
                                "not a key/value pair: {}",
                                item
                            )))
                        }
                    };
                    let key = match key {
                        Value::String(s) => s.clone(),
                        Value::Number(n) => n.to_string(),
                        Value::Bool(b) => b.to_string(),
                        other => {
                            return Err(Error::InvalidQueryInput(format!(
                                "invalid key: {}",
                                other
                            )))
                        }
                    };
                    query.append(key, QueryValue::from_json(val));
                }
                Ok(query)
            }
            other => Err(Error::InvalidQueryInput(format!(
                "not a valid non-string sequence or mapping: {}",
                other
            ))),
        }
    }

    /// Add an entry, builder style
    pub fn push(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.append(key, value);
        self
    }

    /// Add an entry, keeping any existing entries with the same key
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Replace the value of the first entry with this key, or append it
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Number of entries, absent ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Encode as a query string
    ///
    /// With `expand_sequences`, each element of a list value becomes its own
    /// `key=value` token sharing the key. Absent list elements are skipped.
    pub fn encode(&self, expand_sequences: bool) -> String {
        let mut tokens = Vec::with_capacity(self.entries.len());

        for (key, value) in self.entries.iter().filter(|(_, v)| !v.is_absent()) {
            let key = encode_query_element(key);
            match value {
                QueryValue::List(items) if expand_sequences => {
                    for item in items.iter().filter(|v| !v.is_absent()) {
                        tokens.push(format!("{}={}", key, item.encoded()));
                    }
                }
                _ => tokens.push(format!("{}={}", key, value.encoded())),
            }
        }

        tokens.join("&")
    }
}

impl<K: Into<String>, V: Into<QueryValue>> FromIterator<(K, V)> for Query {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Query::from_pairs(iter)
    }
}

/// Encode a query into a query string
///
/// Spaces become `%20`, never `+`.
pub fn urlencode(query: &Query, expand_sequences: bool) -> String {
    query.encode(expand_sequences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_pairs_keep_order_and_repeats() {
        let q = Query::from_pairs(vec![("z", "1"), ("a", "2"), ("z", "3")]);
        assert_eq!(q.encode(false), "z=1&a=2&z=3");
    }

    #[test]
    fn test_absent_pairs_dropped() {
        let q = Query::new()
            .push("a", "1")
            .push("gone", None::<&str>)
            .push("b", "2");
        assert_eq!(q.encode(false), "a=1&b=2");
        assert!(!q.encode(true).contains("gone"));
    }

    #[test]
    fn test_absent_mapping_entries_dropped() {
        let mut map = BTreeMap::new();
        map.insert("start", Some("0"));
        map.insert("skip", None);
        map.insert("rows", Some("10"));
        let q = Query::from_mapping(map);
        assert_eq!(q.encode(false), "rows=10&start=0");
    }

    #[test]
    fn test_values_are_query_encoded() {
        let q = Query::new()
            .push("q", "name:puma concolor")
            .push("path", "a/b?c")
            .push("amp", "x&y=z");
        assert_eq!(
            q.encode(false),
            "q=name:puma%20concolor&path=a/b?c&amp=x%26y%3Dz"
        );
    }

    #[test]
    fn test_keys_are_query_encoded() {
        let q = Query::new().push("a key", "v");
        assert_eq!(q.encode(false), "a%20key=v");
    }

    #[test]
    fn test_scalars_use_text_form() {
        let q = Query::new().push("n", 42).push("flag", true).push("big", 7u64);
        assert_eq!(q.encode(false), "n=42&flag=true&big=7");
    }

    #[test]
    fn test_bytes_value() {
        let q = Query::new().push("raw", QueryValue::bytes(vec![0xde, 0xad, b'x']));
        assert_eq!(q.encode(false), "raw=%DE%ADx");
    }

    #[test]
    fn test_expand_sequences() {
        let q = Query::new()
            .push("fl", vec!["id", "name", "date"])
            .push("rows", 5);
        assert_eq!(q.encode(true), "fl=id&fl=name&fl=date&rows=5");
    }

    #[test]
    fn test_sequence_without_expand_is_joined() {
        let q = Query::new().push("fl", vec!["id", "name"]);
        assert_eq!(q.encode(false), "fl=id,name");
    }

    #[test]
    fn test_expand_skips_absent_elements() {
        let q = Query::new().push("k", vec![Some("a"), None, Some("b")]);
        assert_eq!(q.encode(true), "k=a&k=b");
    }

    #[test]
    fn test_expand_empty_sequence_emits_nothing() {
        let q = Query::new().push("k", Vec::<String>::new()).push("x", "1");
        assert_eq!(q.encode(true), "x=1");
    }

    #[test]
    fn test_mapping_duplicate_key_keeps_position() {
        let q = Query::from_mapping(vec![("a", "1"), ("b", "2"), ("a", "3")]);
        assert_eq!(q.encode(false), "a=3&b=2");
    }

    #[test]
    fn test_empty_query() {
        assert_eq!(Query::new().encode(true), "");
        assert_eq!(urlencode(&Query::new(), false), "");
    }

    #[test]
    fn test_from_json_object_keeps_order() {
        let value = json!({"zeta": 1, "alpha": "x y", "none": null, "list": [1, 2]});
        let q = Query::from_json(&value).unwrap();
        assert_eq!(q.encode(false), "zeta=1&alpha=x%20y&list=1,2");
        assert_eq!(q.encode(true), "zeta=1&alpha=x%20y&list=1&list=2");
    }

    #[test]
    fn test_from_json_pairs() {
        let value = json!([["a", 1], ["a", 2], ["b", null]]);
        let q = Query::from_json(&value).unwrap();
        assert_eq!(q.encode(false), "a=1&a=2");
    }

    #[test]
    fn test_from_json_rejects_invalid_top_level() {
        for value in [json!("a=1"), json!(3), json!(null), json!(["a", "b"]), json!([[1, 2, 3]])] {
            let err = Query::from_json(&value).unwrap_err();
            assert!(matches!(err, Error::InvalidQueryInput(_)), "{:?}", value);
        }
    }

    #[test]
    fn test_from_json_empty_array_is_empty_query() {
        let q = Query::from_json(&json!([])).unwrap();
        assert!(q.is_empty());
    }
}
