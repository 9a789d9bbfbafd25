//! Order-preserving JSON tree
//!
//! Scenario files are read and rewritten through this model rather than a
//! generic JSON library so that key order and the raw text of every string
//! survive a round trip unchanged.

mod parse;
mod write;

pub use parse::parse;
pub use write::to_json_string;

/// A JSON value whose maps keep insertion order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderedJson {
    Map(OrderedMap),
    List(Vec<OrderedJson>),
    /// Raw string contents, escapes are kept as written
    String(String),
    Bool(bool),
}

impl OrderedJson {
    /// Shorthand for a string leaf
    pub fn str(value: impl Into<String>) -> Self {
        OrderedJson::String(value.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OrderedJson::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&OrderedMap> {
        match self {
            OrderedJson::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[OrderedJson]> {
        match self {
            OrderedJson::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OrderedJson::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Name of the value kind, for error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            OrderedJson::Map(_) => "map",
            OrderedJson::List(_) => "list",
            OrderedJson::String(_) => "string",
            OrderedJson::Bool(_) => "bool",
        }
    }
}

impl From<OrderedMap> for OrderedJson {
    fn from(map: OrderedMap) -> Self {
        OrderedJson::Map(map)
    }
}

impl From<Vec<OrderedJson>> for OrderedJson {
    fn from(items: Vec<OrderedJson>) -> Self {
        OrderedJson::List(items)
    }
}

impl From<bool> for OrderedJson {
    fn from(b: bool) -> Self {
        OrderedJson::Bool(b)
    }
}

/// Key/value pairs in insertion order, keys unique
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedMap {
    entries: Vec<(String, OrderedJson)>,
}

impl OrderedMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value. An existing key keeps its position and gets the new value.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<OrderedJson>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&OrderedJson> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<OrderedJson> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OrderedJson)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<OrderedJson>> FromIterator<(K, V)> for OrderedMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OrderedMap::new();
        for (k, v) in iter {
            map.put(k, v);
        }
        map
    }
}
