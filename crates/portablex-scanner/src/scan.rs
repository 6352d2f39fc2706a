use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use portablex_catalog::CatalogEntry;
use tracing::{debug, info, warn};

use crate::source::{CatalogSource, ScanError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Hydrating,
    Scanning,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub enum CatalogEvent {
    /// The cached snapshot, shown until the first scan finishes.
    Provisional(Arc<Vec<CatalogEntry>>),
    Completed(Arc<Vec<CatalogEntry>>),
    /// The published catalog is now empty.
    Failed { error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshRequest {
    Started,
    /// A scan was already running; nothing was queued.
    Dropped,
}

enum Command {
    Refresh,
    Shutdown,
}

#[derive(Debug)]
struct Published {
    phase: ScanPhase,
    catalog: Arc<Vec<CatalogEntry>>,
    /// Set once a scan has finished, successfully or not.
    authoritative: bool,
    last_error: Option<String>,
}

struct Shared {
    published: Mutex<Published>,
    subscribers: Mutex<Vec<Sender<CatalogEvent>>>,
    busy: AtomicBool,
    hydrated: AtomicBool,
    passes: AtomicU64,
}

impl Shared {
    fn set_phase(&self, phase: ScanPhase) {
        self.published.lock().phase = phase;
    }

    fn broadcast(&self, event: CatalogEvent) {
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

/// Drives catalog refreshes on a dedicated worker thread.
///
/// At most one scan runs at a time; a refresh requested while one is in
/// flight is dropped. The first refresh publishes the cached snapshot
/// before scanning. [`ScanOrchestrator::snapshot`] never blocks on I/O.
pub struct ScanOrchestrator {
    shared: Arc<Shared>,
    commands: Sender<Command>,
    handle: Option<JoinHandle<()>>,
}

impl ScanOrchestrator {
    pub fn new<S: CatalogSource>(source: S) -> Result<Self, ScanError> {
        let shared = Arc::new(Shared {
            published: Mutex::new(Published {
                phase: ScanPhase::Idle,
                catalog: Arc::new(Vec::new()),
                authoritative: false,
                last_error: None,
            }),
            subscribers: Mutex::new(Vec::new()),
            busy: AtomicBool::new(false),
            hydrated: AtomicBool::new(false),
            passes: AtomicU64::new(0),
        });
        let (tx, rx) = unbounded();
        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("catalog-scan".into())
            .spawn(move || scan_worker(source, worker_shared, rx))
            .map_err(ScanError::Spawn)?;
        Ok(Self {
            shared,
            commands: tx,
            handle: Some(handle),
        })
    }

    /// Starts a background refresh unless one is already running.
    pub fn refresh(&self) -> RefreshRequest {
        if self
            .shared
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("refresh dropped; scan already in flight");
            return RefreshRequest::Dropped;
        }
        if self.commands.send(Command::Refresh).is_err() {
            warn!("catalog scan worker is gone");
            self.shared.busy.store(false, Ordering::Release);
            return RefreshRequest::Dropped;
        }
        RefreshRequest::Started
    }

    /// The latest published catalog: the last finished scan, else the
    /// cached snapshot, else empty.
    pub fn snapshot(&self) -> Arc<Vec<CatalogEntry>> {
        Arc::clone(&self.shared.published.lock().catalog)
    }

    pub fn phase(&self) -> ScanPhase {
        self.shared.published.lock().phase
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.published.lock().last_error.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::Acquire)
    }

    /// Number of scan passes that have run to the end.
    pub fn completed_passes(&self) -> u64 {
        self.shared.passes.load(Ordering::Acquire)
    }

    /// Receives every event published after this call.
    pub fn subscribe(&self) -> Receiver<CatalogEvent> {
        let (tx, rx) = unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }
}

impl Drop for ScanOrchestrator {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn scan_worker<S: CatalogSource>(source: S, shared: Arc<Shared>, receiver: Receiver<Command>) {
    while let Ok(command) = receiver.recv() {
        match command {
            Command::Shutdown => break,
            Command::Refresh => {
                if !shared.hydrated.swap(true, Ordering::AcqRel) {
                    hydrate(&source, &shared);
                }
                run_scan(&source, &shared);
            }
        }
    }
}

fn hydrate<S: CatalogSource>(source: &S, shared: &Shared) {
    shared.set_phase(ScanPhase::Hydrating);
    let cached = match source.load_cached() {
        Ok(entries) if !entries.is_empty() => Arc::new(entries),
        Ok(_) => return,
        Err(miss) => {
            debug!(%miss, "no usable catalog cache");
            return;
        }
    };
    {
        let mut published = shared.published.lock();
        if published.authoritative {
            return;
        }
        published.catalog = Arc::clone(&cached);
    }
    info!(apps = cached.len(), "showing cached catalog");
    shared.broadcast(CatalogEvent::Provisional(cached));
}

fn run_scan<S: CatalogSource>(source: &S, shared: &Shared) {
    shared.set_phase(ScanPhase::Scanning);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| source.scan()))
        .unwrap_or(Err(ScanError::Panicked));

    let event = match outcome {
        Ok(entries) => {
            if let Err(err) = source.persist(&entries) {
                warn!(%err, "failed to persist catalog cache");
            }
            let entries = Arc::new(entries);
            let mut published = shared.published.lock();
            published.phase = ScanPhase::Completed;
            published.catalog = Arc::clone(&entries);
            published.authoritative = true;
            published.last_error = None;
            info!(apps = entries.len(), "catalog scan completed");
            CatalogEvent::Completed(entries)
        }
        Err(err) => {
            let error = err.to_string();
            warn!(%error, "catalog scan failed");
            let mut published = shared.published.lock();
            published.phase = ScanPhase::Failed;
            published.catalog = Arc::new(Vec::new());
            published.authoritative = true;
            published.last_error = Some(error.clone());
            CatalogEvent::Failed { error }
        }
    };
    shared.passes.fetch_add(1, Ordering::AcqRel);
    // Subscribers may refresh as soon as they see the event.
    shared.busy.store(false, Ordering::Release);
    shared.broadcast(event);
}
