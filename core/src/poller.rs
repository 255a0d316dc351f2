use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::record::Record;
use crate::state::InventoryState;
use crate::sync::{SheetFetcher, SyncMode, SyncOutcome, fetch_collection};

/// Shortest accepted polling interval.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// A finished fetch, delivered to the thread that owns the state.
#[derive(Debug)]
pub struct SyncUpdate {
    pub mode: SyncMode,
    pub generation: u64,
    pub result: Result<Vec<Record>, SyncError>,
}

/// Background task that syncs one link on a fixed interval until cancelled.
struct Poller {
    stop_tx: Sender<()>,
}

impl Poller {
    fn spawn(
        fetcher: Arc<dyn SheetFetcher>,
        link: String,
        interval: Duration,
        generation: u64,
        updates: Sender<SyncUpdate>,
    ) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        thread::spawn(move || {
            debug!(generation, "sync poller started");
            loop {
                let result = fetch_collection(fetcher.as_ref(), &link, Utc::now());
                let update = SyncUpdate {
                    mode: SyncMode::Background,
                    generation,
                    result,
                };
                if updates.send(update).is_err() {
                    break;
                }
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            debug!(generation, "sync poller stopped");
        });
        Self { stop_tx }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}

/// Owns the periodic sync for the active source link.
///
/// At most one poller is armed at a time: [`SyncScheduler::rearm`] stops the
/// previous one before starting the next. Every arm bumps a generation
/// number, and [`SyncScheduler::apply_pending`] only applies results of the
/// current generation, so a fetch still in flight for a replaced link can
/// never overwrite the state.
///
/// Only the latest interactive fetch owns the busy flag. A superseded one
/// is dropped without touching it while a newer one is still running.
pub struct SyncScheduler {
    fetcher: Arc<dyn SheetFetcher>,
    interval: Duration,
    generation: u64,
    poller: Option<Poller>,
    pending_interactive: Option<u64>,
    updates_tx: Sender<SyncUpdate>,
    updates_rx: Receiver<SyncUpdate>,
}

impl SyncScheduler {
    /// Intervals below [`MIN_INTERVAL`] are raised to it.
    pub fn new(fetcher: Arc<dyn SheetFetcher>, interval: Duration) -> Self {
        let interval = if interval < MIN_INTERVAL {
            warn!(requested = ?interval, minimum = ?MIN_INTERVAL, "sync interval too short, using minimum");
            MIN_INTERVAL
        } else {
            interval
        };
        let (updates_tx, updates_rx) = mpsc::channel();
        Self {
            fetcher,
            interval,
            generation: 0,
            poller: None,
            pending_interactive: None,
            updates_tx,
            updates_rx,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_armed(&self) -> bool {
        self.poller.is_some()
    }

    /// Cancels the running poller and, for a non-empty link, starts a new
    /// one that syncs immediately and then on every interval.
    pub fn rearm(&mut self, link: &str) {
        self.cancel();
        if link.trim().is_empty() {
            return;
        }
        info!(generation = self.generation, interval = ?self.interval, "arming sync poller");
        self.poller = Some(Poller::spawn(
            Arc::clone(&self.fetcher),
            link.to_string(),
            self.interval,
            self.generation,
            self.updates_tx.clone(),
        ));
    }

    pub fn cancel(&mut self) {
        self.generation += 1;
        self.poller = None;
    }

    /// Runs one interactive fetch on a worker thread. It replaces any
    /// earlier interactive fetch as the owner of the busy flag.
    pub fn trigger(&mut self, link: &str) {
        let fetcher = Arc::clone(&self.fetcher);
        let link = link.to_string();
        let generation = self.generation;
        self.pending_interactive = Some(generation);
        let updates = self.updates_tx.clone();
        thread::spawn(move || {
            let result = fetch_collection(fetcher.as_ref(), &link, Utc::now());
            let _ = updates.send(SyncUpdate {
                mode: SyncMode::Interactive,
                generation,
                result,
            });
        });
    }

    pub fn is_current(&self, update: &SyncUpdate) -> bool {
        update.generation == self.generation
    }

    /// Next waiting update. Stale background updates are dropped here;
    /// stale interactive ones are still delivered so their busy flag can
    /// be cleared.
    pub fn try_recv(&self) -> Option<SyncUpdate> {
        loop {
            match self.updates_rx.try_recv() {
                Ok(update) => {
                    if self.is_current(&update) || update.mode == SyncMode::Interactive {
                        return Some(update);
                    }
                    debug!(generation = update.generation, "dropping stale sync update");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return None,
            }
        }
    }

    /// Applies every waiting update to `state`. Returns `true` when the
    /// collection was replaced.
    pub fn apply_pending(&mut self, state: &mut InventoryState) -> bool {
        let mut replaced = false;
        while let Some(update) = self.try_recv() {
            if update.mode == SyncMode::Interactive
                && self.pending_interactive == Some(update.generation)
            {
                self.pending_interactive = None;
            }
            if !self.is_current(&update) {
                if self.pending_interactive.is_none() {
                    state.abandon_sync(update.mode);
                }
                continue;
            }
            if let Ok(SyncOutcome::Replaced { .. }) = state.finish_sync(update.mode, update.result, Utc::now()) {
                replaced = true;
            }
        }
        replaced
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
