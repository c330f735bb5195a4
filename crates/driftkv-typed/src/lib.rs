//! Typed access for DriftKV
//!
//! Wraps the DriftKV core `Store` with typed getters and setters for exactly
//! four value types: `String`, `i64`, `f64` and `bool`.
//!
//! # Architecture
//!
//! The core only deals in `(key, ValueType, text)` triples. This crate:
//! - Indexes the startup snapshot into one `hashbrown` map per type
//! - Serves every read from those maps (no locking of the core)
//! - Converts typed writes to text and forwards them to the core queue

pub mod store;
pub mod value;

pub use driftkv_core::{Config, StoreError, StoreResult, ValueType};
pub use store::TypedStore;
pub use value::{StoredValue, TypedMaps};
