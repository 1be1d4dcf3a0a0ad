use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::value::{Key, Value};

/// Host-owned snapshot of a runtime table.
///
/// Entries are kept in one map keyed by [`Key`]; the number, boolean and string
/// partitions are views over it. Numeric keys iterate in ascending order.
/// Nil never appears as a stored value: inserting nil removes the key, as the
/// runtime does.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    entries: BTreeMap<Key, Value>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an array-like table with keys `1..=n`.
    pub fn sequence<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        values
            .into_iter()
            .enumerate()
            .map(|(index, value)| (Key::from(index + 1), value.into()))
            .collect()
    }

    pub fn insert(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        match value.into() {
            Value::Nil => self.entries.remove(&key),
            value => self.entries.insert(key, value),
        }
    }

    /// Chaining form of [`Table::insert`].
    pub fn with(mut self, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: impl Into<Key>) -> Option<&Value> {
        self.entries.get(&key.into())
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.entries.get(&Key::String(name.to_string()))
    }

    pub fn index(&self, position: f64) -> Option<&Value> {
        self.entries.get(&Key::Number(position))
    }

    pub fn remove(&mut self, key: impl Into<Key>) -> Option<Value> {
        self.entries.remove(&key.into())
    }

    pub fn contains_key(&self, key: impl Into<Key>) -> bool {
        self.entries.contains_key(&key.into())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Key, Value> {
        self.entries.iter()
    }

    pub fn number_fields(&self) -> impl Iterator<Item = (f64, &Value)> + '_ {
        self.entries.iter().filter_map(|(key, value)| match key {
            Key::Number(number) => Some((*number, value)),
            _ => None,
        })
    }

    pub fn boolean_fields(&self) -> impl Iterator<Item = (bool, &Value)> + '_ {
        self.entries.iter().filter_map(|(key, value)| match key {
            Key::Boolean(flag) => Some((*flag, value)),
            _ => None,
        })
    }

    pub fn string_fields(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.entries.iter().filter_map(|(key, value)| match key {
            Key::String(name) => Some((name.as_str(), value)),
            _ => None,
        })
    }
}

impl FromIterator<(Key, Value)> for Table {
    fn from_iter<I: IntoIterator<Item = (Key, Value)>>(iter: I) -> Self {
        let mut table = Table::new();
        for (key, value) in iter {
            table.insert(key, value);
        }
        table
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = (&'a Key, &'a Value);
    type IntoIter = btree_map::Iter<'a, Key, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// Serialized as a list of `[key, value]` pairs: JSON objects cannot carry
// number or boolean keys.
impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.iter())
    }
}

impl<'de> Deserialize<'de> for Table {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<(Key, Value)>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}
