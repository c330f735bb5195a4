//! Entry data model and the in-memory entry store
//!
//! Every value is held as text. The `(key, ValueType)` pair is unique inside
//! an `EntryStore`; the same key may exist independently under each type.

use std::fmt;
use std::str::FromStr;

/// The closed set of value types a record can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Arbitrary UTF-8 text, base64 encoded on disk
    String,
    /// Signed 64-bit integer
    Int,
    /// 64-bit float
    Float,
    /// `true` / `false`
    Bool,
}

impl ValueType {
    /// All variants, in on-disk token order.
    pub const ALL: [ValueType; 4] = [ValueType::String, ValueType::Int, ValueType::Float, ValueType::Bool];

    /// The literal token written to the file.
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::String => "String",
            ValueType::Int => "Int",
            ValueType::Float => "Float",
            ValueType::Bool => "Bool",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a token is not one of the four known type tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTypeTag(pub String);

impl FromStr for ValueType {
    type Err = UnknownTypeTag;

    /// Case-sensitive exact match.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "String" => Ok(ValueType::String),
            "Int" => Ok(ValueType::Int),
            "Float" => Ok(ValueType::Float),
            "Bool" => Ok(ValueType::Bool),
            other => Err(UnknownTypeTag(other.to_string())),
        }
    }
}

/// One (key, type, textual value) record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value_type: ValueType,
    pub value: String,
}

impl Entry {
    pub fn new(key: impl Into<String>, value_type: ValueType, value: impl Into<String>) -> Self {
        Self { key: key.into(), value_type, value: value.into() }
    }

    fn matches(&self, key: &str, value_type: ValueType) -> bool {
        self.value_type == value_type && self.key == key
    }
}

/// Insertion-ordered list of entries, unique per `(key, ValueType)`.
///
/// A linear scan is used for lookups: stores are expected to be small
/// (settings-sized) and file order must follow insertion order.
#[derive(Debug, Default, Clone)]
pub struct EntryStore {
    entries: Vec<Entry>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a loaded snapshot, collapsing duplicate pairs
    /// (last one wins, first position kept).
    pub fn from_entries(entries: Vec<Entry>) -> Self {
        let mut store = Self::new();
        for entry in entries {
            store.upsert(entry.key, entry.value_type, entry.value);
        }
        store
    }

    /// Replace the value of an existing pair, or append a new entry.
    pub fn upsert(&mut self, key: String, value_type: ValueType, value: String) {
        match self.entries.iter_mut().find(|e| e.matches(&key, value_type)) {
            Some(existing) => existing.value = value,
            None => self.entries.push(Entry { key, value_type, value }),
        }
    }

    /// Remove the pair. Returns true if an entry was removed.
    pub fn remove(&mut self, key: &str, value_type: ValueType) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| !e.matches(key, value_type));
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, key: &str, value_type: ValueType) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.matches(key, value_type))
            .map(|e| e.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<Entry> {
        self.entries.clone()
    }
}
