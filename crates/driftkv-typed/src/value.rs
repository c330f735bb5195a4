//! The closed set of Rust types a `TypedStore` can hold.
//!
//! `StoredValue` is sealed: only `String`, `i64`, `f64` and `bool` implement
//! it, so asking for any other type fails to compile.

use hashbrown::HashMap;

use driftkv_core::codec;
use driftkv_core::ValueType;

mod sealed {
    pub trait Sealed {}
    impl Sealed for String {}
    impl Sealed for i64 {}
    impl Sealed for f64 {}
    impl Sealed for bool {}
}

/// Per-type lookup maps, one per `ValueType`.
#[derive(Debug, Default, Clone)]
pub struct TypedMaps {
    strings: HashMap<String, String>,
    ints: HashMap<String, i64>,
    floats: HashMap<String, f64>,
    bools: HashMap<String, bool>,
}

impl TypedMaps {
    /// Total number of values across all types.
    pub fn len(&self) -> usize {
        self.strings.len() + self.ints.len() + self.floats.len() + self.bools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.strings.clear();
        self.ints.clear();
        self.floats.clear();
        self.bools.clear();
    }

    /// Parse `text` as `value_type` and index it. Returns false if the text
    /// is not valid for the type.
    pub fn insert_text(&mut self, key: &str, value_type: ValueType, text: &str) -> bool {
        match value_type {
            ValueType::String => insert_parsed::<String>(self, key, text),
            ValueType::Int => insert_parsed::<i64>(self, key, text),
            ValueType::Float => insert_parsed::<f64>(self, key, text),
            ValueType::Bool => insert_parsed::<bool>(self, key, text),
        }
    }
}

fn insert_parsed<T: StoredValue>(maps: &mut TypedMaps, key: &str, text: &str) -> bool {
    match T::from_text(text) {
        Some(value) => {
            T::map_mut(maps).insert(key.to_string(), value);
            true
        }
        None => false,
    }
}

/// A Rust type with a fixed `ValueType` and a locale-independent text form.
pub trait StoredValue: sealed::Sealed + Clone + Send + Sync + 'static {
    /// Tag this type is persisted under.
    const VALUE_TYPE: ValueType;

    fn to_text(&self) -> String;

    fn from_text(text: &str) -> Option<Self>;

    #[doc(hidden)]
    fn map(maps: &TypedMaps) -> &HashMap<String, Self>;

    #[doc(hidden)]
    fn map_mut(maps: &mut TypedMaps) -> &mut HashMap<String, Self>;
}

impl StoredValue for String {
    const VALUE_TYPE: ValueType = ValueType::String;

    fn to_text(&self) -> String {
        self.clone()
    }

    fn from_text(text: &str) -> Option<Self> {
        Some(text.to_string())
    }

    fn map(maps: &TypedMaps) -> &HashMap<String, Self> { &maps.strings }
    fn map_mut(maps: &mut TypedMaps) -> &mut HashMap<String, Self> { &mut maps.strings }
}

impl StoredValue for i64 {
    const VALUE_TYPE: ValueType = ValueType::Int;

    fn to_text(&self) -> String {
        codec::format_int(*self)
    }

    fn from_text(text: &str) -> Option<Self> {
        codec::parse_int(text)
    }

    fn map(maps: &TypedMaps) -> &HashMap<String, Self> { &maps.ints }
    fn map_mut(maps: &mut TypedMaps) -> &mut HashMap<String, Self> { &mut maps.ints }
}

impl StoredValue for f64 {
    const VALUE_TYPE: ValueType = ValueType::Float;

    fn to_text(&self) -> String {
        codec::format_float(*self)
    }

    fn from_text(text: &str) -> Option<Self> {
        codec::parse_float(text)
    }

    fn map(maps: &TypedMaps) -> &HashMap<String, Self> { &maps.floats }
    fn map_mut(maps: &mut TypedMaps) -> &mut HashMap<String, Self> { &mut maps.floats }
}

impl StoredValue for bool {
    const VALUE_TYPE: ValueType = ValueType::Bool;

    fn to_text(&self) -> String {
        codec::format_bool(*self)
    }

    fn from_text(text: &str) -> Option<Self> {
        codec::parse_bool(text)
    }

    fn map(maps: &TypedMaps) -> &HashMap<String, Self> { &maps.bools }
    fn map_mut(maps: &mut TypedMaps) -> &mut HashMap<String, Self> { &mut maps.bools }
}
