//! Asynchronous reload daemon.
//!
//! One named worker thread per cache core consumes a FIFO of
//! `(key type, key)` reload requests, fetches the authoritative state from the
//! backing store and repopulates the owning shard. The daemon holds only a
//! weak reference to the core internals: once the core is destroyed, pending
//! reloads are discarded instead of resurrecting shards.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak, mpsc};
use std::thread::{self, JoinHandle};

use tracing::warn;

use hashbrown::HashSet;

use crate::cache::{CacheInner, CacheStatus};

/// Data type of a queued reload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// Plain string value.
    Kv,
    /// Hash.
    Hash,
    /// List.
    List,
    /// Set.
    Set,
    /// Sorted set.
    ZSet,
}

#[derive(Debug)]
enum LoadCommand {
    Load { key_type: KeyType, key: Vec<u8> },
    Shutdown,
}

pub(crate) struct CacheLoader {
    sender: mpsc::Sender<LoadCommand>,
    pending: Arc<Mutex<HashSet<Vec<u8>>>>,
    admitted: Arc<AtomicU64>,
    depth: Arc<AtomicUsize>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for CacheLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLoader")
            .field("admitted", &self.admitted.load(Ordering::Acquire))
            .field("depth", &self.depth.load(Ordering::Acquire))
            .field("has_worker", &self.worker.is_some())
            .finish_non_exhaustive()
    }
}

impl CacheLoader {
    pub(crate) fn spawn(inner: Weak<CacheInner>) -> Self {
        let (sender, receiver) = mpsc::channel::<LoadCommand>();
        let pending = Arc::new(Mutex::new(HashSet::new()));
        let depth = Arc::new(AtomicUsize::new(0));
        let pending_for_worker = Arc::clone(&pending);
        let depth_for_worker = Arc::clone(&depth);
        let worker = thread::Builder::new()
            .name("slotcache-loader".to_owned())
            .spawn(move || {
                loader_main(&receiver, &inner, &pending_for_worker, &depth_for_worker);
            })
            .ok();
        Self {
            sender,
            pending,
            admitted: Arc::new(AtomicU64::new(0)),
            depth,
            worker,
        }
    }

    /// Enqueues one reload unless the key is already pending. Returns true
    /// when the request was admitted.
    pub(crate) fn push(&self, key_type: KeyType, key: &[u8]) -> bool {
        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if !pending.insert(key.to_vec()) {
                return false;
            }
        }
        self.depth.fetch_add(1, Ordering::AcqRel);
        if self
            .sender
            .send(LoadCommand::Load {
                key_type,
                key: key.to_vec(),
            })
            .is_err()
        {
            self.depth.fetch_sub(1, Ordering::AcqRel);
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = pending.remove(key);
            return false;
        }
        let _ = self.admitted.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Total requests admitted since the daemon started.
    pub(crate) fn admitted_keys(&self) -> u64 {
        self.admitted.load(Ordering::Acquire)
    }

    /// Current queue depth.
    pub(crate) fn waiting_keys(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Stops the worker after it drains the queue.
    pub(crate) fn shutdown(&mut self) {
        let _ = self.sender.send(LoadCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for CacheLoader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn loader_main(
    receiver: &mpsc::Receiver<LoadCommand>,
    inner: &Weak<CacheInner>,
    pending: &Arc<Mutex<HashSet<Vec<u8>>>>,
    depth: &Arc<AtomicUsize>,
) {
    loop {
        let Ok(command) = receiver.recv() else {
            break;
        };
        let LoadCommand::Load { key_type, key } = command else {
            break;
        };
        depth.fetch_sub(1, Ordering::AcqRel);
        {
            let mut pending = pending.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = pending.remove(&key);
        }
        // A dead upgrade or a torn-down core means the reload must be
        // discarded, never replayed into rebuilt shards.
        let Some(core) = inner.upgrade() else {
            continue;
        };
        if core.status() != CacheStatus::Ok {
            continue;
        }
        if let Err(error) = core.load_key(key_type, &key) {
            warn!(?key_type, error = %error, "async cache reload failed");
        }
    }
}
