//! Persistence worker — background flush from the pending queue to disk
//!
//! One thread per open store. Every `flush_interval` it checks the pending
//! queue; when changes are waiting it runs a flush cycle:
//!
//! 1. Draining: take the flush lock, then the entry lock, drain the queue and
//!    apply each change in FIFO order
//! 2. Serializing: render every entry as a record line, release the entry lock
//! 3. Swapping: write the side file and rename it over the main file
//!
//! An I/O failure in steps 2-3 is logged, reported through the error
//! callback, and stops the worker. It does not retry; the failed state is
//! picked up again by an explicit `flush()` or by `close()`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::codec;
use crate::config::Config;
use crate::entry::EntryStore;
use crate::error::{StoreError, StoreResult};
use crate::queue::{ChangeOp, PendingChangeQueue};
use crate::swap;

/// Longest the worker sleeps before rechecking the stop flag.
const STOP_POLL: Duration = Duration::from_millis(5);

/// State shared between the store handle and its worker thread.
///
/// Lock order: `flush_lock` → `entries` → queue internals.
pub(crate) struct Shared {
    /// Main file path
    pub path: PathBuf,
    pub config: Config,
    /// Every EntryStore mutation goes through this lock
    pub entries: Mutex<EntryStore>,
    pub queue: PendingChangeQueue,
    /// Serializes flush cycles against each other and against wipe
    pub flush_lock: Mutex<()>,
    /// Applied changes not yet on disk because a write failed
    unsaved: AtomicBool,
    /// Terminal error of the worker, if it stopped on a failure
    worker_error: Mutex<Option<String>>,
    total_cycles: AtomicU64,
    total_written: AtomicU64,
}

impl Shared {
    pub fn new(path: PathBuf, config: Config, entries: EntryStore) -> Self {
        Self {
            path,
            config,
            entries: Mutex::new(entries),
            queue: PendingChangeQueue::new(),
            flush_lock: Mutex::new(()),
            unsaved: AtomicBool::new(false),
            worker_error: Mutex::new(None),
            total_cycles: AtomicU64::new(0),
            total_written: AtomicU64::new(0),
        }
    }

    /// True when a flush cycle would write something.
    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty() || self.unsaved.load(Ordering::Acquire)
    }

    /// Drop any unsaved marker; used by wipe after everything was cleared.
    pub fn clear_unsaved(&self) {
        self.unsaved.store(false, Ordering::Release);
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles.load(Ordering::Relaxed)
    }

    pub fn total_written(&self) -> u64 {
        self.total_written.load(Ordering::Relaxed)
    }

    pub fn worker_error(&self) -> Option<String> {
        self.worker_error.lock().clone()
    }

    fn record_cycle(&self, written: usize) {
        self.total_written.fetch_add(written as u64, Ordering::Relaxed);
        self.total_cycles.fetch_add(1, Ordering::Relaxed);
    }
}

/// Execute one flush cycle.
///
/// Returns `Ok(None)` when there was nothing to do (including when a wipe
/// emptied the queue while this cycle waited for the flush lock), otherwise
/// the number of records written.
pub(crate) fn flush_cycle(shared: &Shared) -> StoreResult<Option<usize>> {
    if !shared.has_pending() {
        return Ok(None);
    }

    let _flush = shared.flush_lock.lock();

    let lines = {
        let mut entries = shared.entries.lock();
        // Raised before the drain so `has_pending` never sees an empty queue
        // with the drained changes not yet applied; stays raised on failure
        let was_unsaved = shared.unsaved.swap(true, Ordering::AcqRel);
        let changes = shared.queue.drain();
        if changes.is_empty() && !was_unsaved {
            shared.unsaved.store(false, Ordering::Release);
            return Ok(None);
        }

        let applied = changes.len();
        for change in changes {
            match change.op {
                ChangeOp::Set(value) => entries.upsert(change.key, change.value_type, value),
                ChangeOp::Tombstone => {
                    entries.remove(&change.key, change.value_type);
                }
            }
        }

        debug!(applied, entries = entries.len(), "drained pending changes");
        entries.iter().map(codec::encode_line).collect::<Vec<_>>()
    };

    let written = swap::write_snapshot(&shared.path, &lines, shared.config.sync_writes)?;

    shared.unsaved.store(false, Ordering::Release);
    shared.record_cycle(written);
    Ok(Some(written))
}

/// Handle to a running persistence worker thread.
/// Dropping this handle stops the thread after a final flush.
pub struct WorkerHandle {
    /// Signal the background thread to stop
    stop: Arc<AtomicBool>,
    /// Background thread join handle
    thread: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request a stop and wait for the thread, including its final flush.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    /// Check if the worker thread is still running.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().map_or(false, |h| !h.is_finished())
    }

    fn stop_and_join(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("flush worker panicked");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

/// Start the persistence worker thread for `shared`.
pub(crate) fn start_worker(shared: Arc<Shared>) -> StoreResult<WorkerHandle> {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_clone = Arc::clone(&stop);
    let path = shared.path.clone();

    let thread = thread::Builder::new()
        .name("driftkv-flush".to_string())
        .spawn(move || worker_loop(&shared, &stop_clone))
        .map_err(|e| StoreError::io(path, e, "Failed to spawn flush worker"))?;

    Ok(WorkerHandle { stop, thread: Some(thread) })
}

/// Main worker loop — runs on the background thread.
fn worker_loop(shared: &Shared, stop: &AtomicBool) {
    let cadence = shared.config.flush_interval;
    debug!(path = %shared.path.display(), ?cadence, "flush worker started");

    loop {
        // Idle: sleep for the cadence, checking the stop flag in slices
        let wake_time = Instant::now() + cadence;
        loop {
            if stop.load(Ordering::Acquire) {
                final_flush(shared);
                return;
            }
            let now = Instant::now();
            if now >= wake_time {
                break;
            }
            thread::sleep(STOP_POLL.min(wake_time - now));
        }

        if let Err(e) = run_cycle(shared) {
            let message = format!("flush of {} failed: {}", shared.path.display(), e);
            error!(path = %shared.path.display(), error = %e, "flush failed, stopping worker");
            shared.config.report(&message);
            *shared.worker_error.lock() = Some(message);
            return;
        }
    }
}

fn run_cycle(shared: &Shared) -> StoreResult<()> {
    let started = Instant::now();
    if let Some(written) = flush_cycle(shared)? {
        debug!(written, elapsed = ?started.elapsed(), "flushed store file");
    }
    Ok(())
}

/// Flush whatever is still pending before the thread exits.
fn final_flush(shared: &Shared) {
    if !shared.has_pending() {
        debug!("flush worker stopped");
        return;
    }
    match run_cycle(shared) {
        Ok(()) => info!(path = %shared.path.display(), "final flush complete"),
        Err(e) => {
            let message = format!("final flush of {} failed: {}", shared.path.display(), e);
            warn!(path = %shared.path.display(), error = %e, "final flush failed");
            shared.config.report(&message);
            *shared.worker_error.lock() = Some(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Entry, ValueType};
    use crate::queue::PendingChange;
    use tempfile::TempDir;

    fn shared_in(dir: &TempDir) -> Arc<Shared> {
        Arc::new(Shared::new(
            dir.path().join("prefs.txt"),
            Config::testing(),
            EntryStore::new(),
        ))
    }

    fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let end = Instant::now() + deadline;
        while Instant::now() < end {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        done()
    }

    #[test]
    fn test_flush_cycle_applies_in_order() {
        let tmp = TempDir::new().unwrap();
        let shared = shared_in(&tmp);

        shared.queue.push(PendingChange::set("a", ValueType::Int, "1"));
        shared.queue.push(PendingChange::tombstone("a", ValueType::Int));
        shared.queue.push(PendingChange::set("b", ValueType::Int, "2"));

        assert_eq!(flush_cycle(&shared).unwrap(), Some(1));
        assert_eq!(shared.entries.lock().to_vec(), vec![Entry::new("b", ValueType::Int, "2")]);
        assert_eq!(std::fs::read_to_string(&shared.path).unwrap(), "b|Int|2\n");
        assert_eq!(shared.total_cycles(), 1);
        assert_eq!(shared.total_written(), 1);
    }

    #[test]
    fn test_flush_cycle_noop_when_empty() {
        let tmp = TempDir::new().unwrap();
        let shared = shared_in(&tmp);

        assert_eq!(flush_cycle(&shared).unwrap(), None);
        assert!(!shared.path.exists());
        assert_eq!(shared.total_cycles(), 0);
    }

    #[test]
    fn test_flush_cycle_noop_after_wipe_while_waiting() {
        let tmp = TempDir::new().unwrap();
        let shared = shared_in(&tmp);

        let guard = shared.flush_lock.lock();
        shared.queue.push(PendingChange::set("k", ValueType::Int, "1"));

        let flusher = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || flush_cycle(&shared))
        };
        // Let the flusher get past the unlocked pending check
        thread::sleep(Duration::from_millis(50));

        // What wipe does while holding the flush lock
        shared.queue.clear();
        shared.clear_unsaved();
        drop(guard);

        assert_eq!(flusher.join().unwrap().unwrap(), None);
        assert!(!shared.path.exists());
        assert_eq!(shared.total_cycles(), 0);
        assert!(!shared.has_pending());
    }

    #[test]
    fn test_tombstone_alone_rewrites_file() {
        let tmp = TempDir::new().unwrap();
        let shared = shared_in(&tmp);

        shared.queue.push(PendingChange::set("gone", ValueType::Bool, "true"));
        flush_cycle(&shared).unwrap();

        // Caller-side delete: remove then queue the marker
        shared.entries.lock().remove("gone", ValueType::Bool);
        shared.queue.push(PendingChange::tombstone("gone", ValueType::Bool));

        assert_eq!(flush_cycle(&shared).unwrap(), Some(0));
        assert_eq!(std::fs::read_to_string(&shared.path).unwrap(), "");
    }

    #[test]
    fn test_failed_write_keeps_state_unsaved() {
        let tmp = TempDir::new().unwrap();
        let shared = Arc::new(Shared::new(
            tmp.path().join("missing-dir").join("prefs.txt"),
            Config::testing(),
            EntryStore::new(),
        ));

        shared.queue.push(PendingChange::set("k", ValueType::Int, "1"));
        assert!(matches!(flush_cycle(&shared), Err(StoreError::Io { .. })));

        // Drained changes live in memory and are still owed to disk
        assert!(shared.queue.is_empty());
        assert!(shared.has_pending());
        assert_eq!(shared.entries.lock().get("k", ValueType::Int), Some("1"));

        std::fs::create_dir_all(shared.path.parent().unwrap()).unwrap();
        assert_eq!(flush_cycle(&shared).unwrap(), Some(1));
        assert!(!shared.has_pending());
    }

    #[test]
    fn test_worker_flushes_on_cadence() {
        let tmp = TempDir::new().unwrap();
        let shared = shared_in(&tmp);
        let handle = start_worker(Arc::clone(&shared)).unwrap();
        assert!(handle.is_running());

        shared.queue.push(PendingChange::set("score", ValueType::Int, "100"));

        let flushed = wait_until(Duration::from_secs(2), || shared.total_cycles() >= 1);
        assert!(flushed, "worker never flushed");
        assert_eq!(std::fs::read_to_string(&shared.path).unwrap(), "score|Int|100\n");

        handle.shutdown();
    }

    #[test]
    fn test_shutdown_runs_final_flush() {
        let tmp = TempDir::new().unwrap();
        let shared = Arc::new(Shared::new(
            tmp.path().join("prefs.txt"),
            Config::testing().with_flush_interval(Duration::from_secs(60)),
            EntryStore::new(),
        ));
        let handle = start_worker(Arc::clone(&shared)).unwrap();

        shared.queue.push(PendingChange::set("late", ValueType::String, "v"));
        handle.shutdown();

        assert!(shared.queue.is_empty());
        assert_eq!(std::fs::read_to_string(&shared.path).unwrap(), "late|String|dg==\n");
    }

    #[test]
    fn test_worker_stops_on_io_failure() {
        let tmp = TempDir::new().unwrap();
        let reported = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = Arc::clone(&reported);
        let config = Config::testing().with_error_handler(move |msg| sink.lock().push(msg.to_string()));

        let shared = Arc::new(Shared::new(
            tmp.path().join("no-such-dir").join("prefs.txt"),
            config,
            EntryStore::new(),
        ));
        let handle = start_worker(Arc::clone(&shared)).unwrap();

        shared.queue.push(PendingChange::set("k", ValueType::Int, "1"));

        let stopped = wait_until(Duration::from_secs(2), || !handle.is_running());
        assert!(stopped, "worker should stop after a failed flush");
        assert_eq!(reported.lock().len(), 1);
        assert!(shared.worker_error().is_some());

        // No further flush attempts once halted
        shared.queue.push(PendingChange::set("k", ValueType::Int, "2"));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(reported.lock().len(), 1);

        handle.shutdown();
    }
}
