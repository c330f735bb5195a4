//! Store handle — the public face of DriftKV.
//!
//! `Store` ties the entry store, the pending queue and the persistence worker
//! together.
//!
//! **Write path**: `set` only appends to the pending queue and returns
//! **Delete path**: remove from the entry store now, queue a tombstone
//! **Background**: the worker drains the queue and rewrites the file on cadence

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::codec;
use crate::config::Config;
use crate::entry::{Entry, EntryStore, ValueType};
use crate::error::{StoreError, StoreResult};
use crate::queue::PendingChange;
use crate::swap;
use crate::worker::{self, Shared, WorkerHandle};

/// An open file-backed key-value store.
///
/// All public methods take `&self`; wrap in `Arc` to share across threads.
/// `set` never blocks on I/O. Dropping the store stops the worker after a
/// final flush; `close` does the same and reports the outcome.
pub struct Store {
    shared: Arc<Shared>,
    worker: Option<WorkerHandle>,
}

impl Store {
    /// Open or create a store backed by the file at `path`.
    ///
    /// Creates the parent directory, loads the existing entries, and starts
    /// the background worker. Returns the handle together with the loaded
    /// entries in file order.
    ///
    /// Fails on an unknown type tag or an undecodable string value anywhere
    /// in the file; malformed lines are skipped.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> StoreResult<(Self, Vec<Entry>)> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::io(parent, e, "Failed to create store directory"))?;
        }

        let loaded = swap::load_entries(&path)?;
        let entries = EntryStore::from_entries(loaded);
        let snapshot = entries.to_vec();

        if !snapshot.is_empty() {
            info!(path = %path.display(), entries = snapshot.len(), "opened store");
        }

        let shared = Arc::new(Shared::new(path, config, entries));
        let worker = worker::start_worker(Arc::clone(&shared))?;

        Ok((Self { shared, worker: Some(worker) }, snapshot))
    }

    /// Queue a value for the pair. Does not touch the entry store; the worker
    /// applies it on its next cycle.
    ///
    /// A key, or an Int/Float/Bool value, containing `|` or a line break
    /// cannot be written as a single record. Such a change is dropped, logged
    /// and reported through the error callback. Returns whether it was queued.
    pub fn set(&self, key: &str, value_type: ValueType, value: &str) -> bool {
        if !codec::fits_record(key, value_type, value) {
            let message = format!("rejected {:?} ({}): record delimiter in key or value", key, value_type);
            warn!(key, %value_type, "dropping change with a record delimiter in key or value");
            self.shared.config.report(&message);
            return false;
        }
        self.shared.queue.push(PendingChange::set(key, value_type, value));
        true
    }

    /// Remove the pair now and queue a tombstone so the next cycle rewrites
    /// the file.
    pub fn delete(&self, key: &str, value_type: ValueType) {
        let mut entries = self.shared.entries.lock();
        entries.remove(key, value_type);
        // Pushed under the entry lock so a concurrent drain sees remove+marker together
        self.shared.queue.push(PendingChange::tombstone(key, value_type));
    }

    /// Clear pending changes, all entries, and both files.
    ///
    /// File deletion errors are logged and reported through the error
    /// callback; the in-memory state is cleared regardless.
    pub fn wipe_all(&self) {
        let removed = {
            let _flush = self.shared.flush_lock.lock();
            {
                let mut entries = self.shared.entries.lock();
                let dropped = self.shared.queue.clear();
                entries.clear();
                self.shared.clear_unsaved();
                debug!(dropped, "wiped pending changes and entries");
            }
            swap::remove_files(&self.shared.path)
        };

        // Reported without the flush lock so the callback may use the store
        if let Err(e) = removed {
            let message = format!("wipe of {} failed: {}", self.shared.path.display(), e);
            warn!(path = %self.shared.path.display(), error = %e, "wipe could not delete store files");
            self.shared.config.report(&message);
        }
    }

    /// Run a flush cycle on the caller's thread.
    ///
    /// Unlike the background worker, a failure here is returned to the
    /// caller and does not stop anything.
    pub fn flush(&self) -> StoreResult<()> {
        worker::flush_cycle(&self.shared).map(|_| ())
    }

    /// Stop the worker, flush anything still pending, and report whether the
    /// final state reached disk.
    pub fn close(mut self) -> StoreResult<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> StoreResult<()> {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }

        // The worker may have halted earlier and left work behind
        if self.shared.has_pending() {
            if let Err(e) = worker::flush_cycle(&self.shared) {
                return Err(match self.shared.worker_error() {
                    Some(message) => StoreError::WorkerFailed(format!("{}; final flush: {}", message, e)),
                    None => e,
                });
            }
        }

        if let Some(message) = self.shared.worker_error() {
            debug!(%message, "worker had failed, final state recovered on close");
        }
        Ok(())
    }

    /// Current value of the pair as applied to the entry store.
    pub fn get(&self, key: &str, value_type: ValueType) -> Option<String> {
        self.shared.entries.lock().get(key, value_type).map(str::to_string)
    }

    /// Copy of every entry, in file order.
    pub fn entries(&self) -> Vec<Entry> {
        self.shared.entries.lock().to_vec()
    }

    /// Number of entries in the entry store.
    pub fn len(&self) -> usize {
        self.shared.entries.lock().len()
    }

    /// Returns true if the entry store has no entries.
    pub fn is_empty(&self) -> bool {
        self.shared.entries.lock().is_empty()
    }

    /// Changes waiting for the next flush cycle.
    pub fn pending_count(&self) -> usize {
        self.shared.queue.len()
    }

    /// Main file path.
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Side file path used while a flush is in progress.
    pub fn side_path(&self) -> PathBuf {
        swap::side_path(&self.shared.path)
    }

    /// Flush cycles that wrote the file since open.
    pub fn flush_cycles(&self) -> u64 {
        self.shared.total_cycles()
    }

    /// Records written across all flush cycles since open.
    pub fn entries_written(&self) -> u64 {
        self.shared.total_written()
    }

    /// False once the worker stopped, either on failure or after close.
    pub fn is_worker_running(&self) -> bool {
        self.worker.as_ref().map_or(false, WorkerHandle::is_running)
    }

    /// Message of the failure that stopped the worker, if any.
    pub fn worker_error(&self) -> Option<String> {
        self.shared.worker_error()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(path = %self.shared.path.display(), error = %e, "store dropped with unsaved changes");
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.shared.path)
            .field("entries", &self.len())
            .field("pending", &self.pending_count())
            .finish()
    }
}
