//! DriftKV Core — Non-Blocking File-Backed Key-Value Store
//!
//! Callers record updates in memory and return immediately; a background
//! worker periodically persists the full state to a single text file.
//!
//! # Architecture
//!
//! - **Write path**: `set` pushes onto an unbounded pending queue (no I/O)
//! - **Delete path**: removed from the entry store at once, tombstone queued
//! - **Flush worker**: drains the queue, applies it, rewrites the whole file
//!   through a side file and an atomic rename
//!
//! # File Format
//!
//! One record per line, `key|Type|value`, where `Type` is one of `String`,
//! `Int`, `Float`, `Bool`. String values are base64 encoded. Typed access
//! lives in separate crates (e.g. driftkv-typed).

pub mod codec;
pub mod config;
pub mod durability;
pub mod entry;
pub mod error;
pub mod queue;
pub mod store;
pub mod swap;
pub mod worker;

// Re-export key types for convenience
pub use config::{Config, ErrorHandler};
pub use entry::{Entry, EntryStore, ValueType};
pub use error::{StoreError, StoreResult};
pub use queue::{ChangeOp, PendingChange, PendingChangeQueue};
pub use store::Store;
pub use worker::WorkerHandle;
