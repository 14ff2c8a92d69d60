//! Class-keyed map that remembers first-insertion order.
//!
//! Export order is the order in which classes were first detected, so the map
//! keeps a `Vec` of entries and a `HashMap` index into it.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Debug, PartialEq)]
pub struct ClassMap<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> ClassMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, class_name: &str) -> bool {
        self.index.contains_key(class_name)
    }

    pub fn get(&self, class_name: &str) -> Option<&V> {
        self.index
            .get(class_name)
            .map(|&position| &self.entries[position].1)
    }

    /// Returns the value for `class_name`, inserting `default()` at the end first
    /// if the class is new.
    pub(crate) fn get_or_insert_with(&mut self, class_name: &str, default: impl FnOnce() -> V) -> &mut V {
        let position = match self.index.get(class_name) {
            Some(&position) => position,
            None => {
                self.entries.push((class_name.to_string(), default()));
                let position = self.entries.len() - 1;
                self.index.insert(class_name.to_string(), position);
                position
            }
        };
        &mut self.entries[position].1
    }

    /// Inserts a new class. Returns `false` (and leaves the map untouched) when
    /// the class is already present.
    pub(crate) fn insert_new(&mut self, class_name: String, value: V) -> bool {
        if self.index.contains_key(&class_name) {
            return false;
        }
        self.index.insert(class_name.clone(), self.entries.len());
        self.entries.push((class_name, value));
        true
    }

    /// Entries in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, value)| value)
    }
}

impl<V> Default for ClassMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Serialize> Serialize for ClassMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for ClassMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ClassMapVisitor(PhantomData))
    }
}

struct ClassMapVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for ClassMapVisitor<V> {
    type Value = ClassMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map keyed by class name")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = ClassMap::new();
        while let Some((name, value)) = access.next_entry::<String, V>()? {
            if !map.insert_new(name.clone(), value) {
                return Err(serde::de::Error::custom(format!(
                    "duplicate class '{name}'"
                )));
            }
        }
        Ok(map)
    }
}
