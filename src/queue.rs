//! Offline queue manager.
//!
//! Donations recorded while disconnected are appended here, persisted to
//! durable local storage after every mutation, and replayed to the remote
//! store in strict insertion order once connectivity returns. Remote-write
//! failures are recorded on the item (`sync_attempts`, `sync_error`) and
//! retried on the next pass; they never abort a flush or reach the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tracing::{info, instrument, warn};

use crate::model::{
    DonationRecord, PendingTransaction, PersistedQueue, QueueSnapshot, TransactionDraft,
};
use crate::remote::RemoteStore;
use crate::store::QueueStorage;

/// Scheduling knobs for the flush triggers.
#[derive(Debug, Clone)]
pub struct SyncQueueOptions {
    /// Delay before the flush scheduled by an offline→online transition,
    /// letting the network stack settle first.
    pub reconnect_delay: Duration,
    /// Delay before the flush scheduled by an enqueue while online. Deferred
    /// so a caller's own online write path finishes first; the next flush
    /// picks the item up if that write never confirmed.
    pub enqueue_delay: Duration,
    /// Pause between successive remote writes within one pass, to avoid
    /// bursting the remote store.
    pub inter_item_delay: Duration,
}

impl Default for SyncQueueOptions {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(2),
            enqueue_delay: Duration::from_millis(500),
            inter_item_delay: Duration::from_millis(300),
        }
    }
}

struct Inner {
    online: bool,
    pending: Vec<PendingTransaction>,
    last_sync_at: Option<DateTime<Utc>>,
}

impl Inner {
    fn snapshot(&self, sync_in_progress: bool) -> QueueSnapshot {
        QueueSnapshot {
            is_online: self.online,
            sync_in_progress,
            pending: self.pending.clone(),
            last_sync_at: self.last_sync_at,
            total_pending_amount: self.pending.iter().map(|t| t.amount).sum(),
            total_pending_calendars: self.pending.iter().map(|t| t.calendars_given).sum(),
        }
    }

    fn clear_synced(&mut self, id: &str) {
        self.pending.retain(|t| t.id != id);
    }

    fn record_failure(&mut self, id: &str, err: &anyhow::Error) -> u32 {
        if let Some(item) = self.pending.iter_mut().find(|t| t.id == id) {
            item.sync_attempts += 1;
            item.last_sync_attempt = Some(Utc::now());
            item.sync_error = Some(format!("{err:#}"));
            item.sync_attempts
        } else {
            0
        }
    }
}

struct Shared {
    remote: Arc<dyn RemoteStore>,
    storage: Arc<dyn QueueStorage>,
    options: SyncQueueOptions,
    state: Mutex<Inner>,
    // Guards against overlapping flush passes triggered by independent
    // events (reconnect, timer, post-enqueue).
    syncing: AtomicBool,
    watch_tx: watch::Sender<QueueSnapshot>,
}

/// Cloneable handle to the queue. One instance is built at startup and passed
/// to whichever components need it.
#[derive(Clone)]
pub struct SyncQueue {
    shared: Arc<Shared>,
}

impl SyncQueue {
    /// Builds the queue, restoring any snapshot left in durable storage by a
    /// previous run. Starts offline until the connectivity signal says
    /// otherwise. An unreadable snapshot starts an empty queue.
    pub async fn restore(
        remote: Arc<dyn RemoteStore>,
        storage: Arc<dyn QueueStorage>,
        options: SyncQueueOptions,
    ) -> Result<Self> {
        let persisted = match storage.load().await? {
            Some(raw) => match serde_json::from_str::<PersistedQueue>(&raw) {
                Ok(state) => state,
                Err(err) => {
                    warn!(?err, "discarding unreadable queue snapshot");
                    PersistedQueue::default()
                }
            },
            None => PersistedQueue::default(),
        };
        if !persisted.pending.is_empty() {
            info!(
                pending = persisted.pending.len(),
                "restored pending donations from local storage"
            );
        }
        let inner = Inner {
            online: false,
            pending: persisted.pending,
            last_sync_at: persisted.last_sync_at,
        };
        let (watch_tx, _) = watch::channel(inner.snapshot(false));
        Ok(Self {
            shared: Arc::new(Shared {
                remote,
                storage,
                options,
                state: Mutex::new(inner),
                syncing: AtomicBool::new(false),
                watch_tx,
            }),
        })
    }

    /// Watch the reactive queue view; a new snapshot is published after every
    /// mutation.
    pub fn subscribe(&self) -> watch::Receiver<QueueSnapshot> {
        self.shared.watch_tx.subscribe()
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        let state = self.shared.state.lock().await;
        state.snapshot(self.shared.syncing.load(Ordering::SeqCst))
    }

    /// Updates the connectivity flag. An offline→online transition schedules
    /// a flush after a short delay; the reverse has no side effect.
    #[instrument(skip_all)]
    pub async fn set_online_status(&self, online: bool) {
        let reconnected = {
            let mut state = self.shared.state.lock().await;
            let was = state.online;
            state.online = online;
            if was != online {
                info!(online, pending = state.pending.len(), "connectivity changed");
                self.publish(&state);
            }
            !was && online
        };
        if reconnected {
            self.schedule_flush(self.shared.options.reconnect_delay);
        }
    }

    /// Fire-and-forget local append: always succeeds from the caller's point
    /// of view; storage trouble is logged, not surfaced.
    #[instrument(skip_all)]
    pub async fn add_pending_transaction(&self, draft: TransactionDraft) {
        let txn = PendingTransaction::from_draft(draft);
        let online = {
            let mut state = self.shared.state.lock().await;
            info!(
                id = %txn.id,
                amount = txn.amount,
                method = txn.payment_method.as_str(),
                "queued pending donation"
            );
            state.pending.push(txn);
            self.persist(&state).await;
            self.publish(&state);
            state.online
        };
        if online {
            self.schedule_flush(self.shared.options.enqueue_delay);
        }
    }

    /// One flush pass: attempts a remote write for every queued item in
    /// insertion order. A no-op when offline, already flushing, or empty.
    /// Resolves when the pass completes; per-item failures are recorded on
    /// the items, never returned.
    #[instrument(skip_all)]
    pub async fn sync_pending_transactions(&self) {
        let shared = &self.shared;
        if shared
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let ids: Vec<String> = {
            let state = shared.state.lock().await;
            if !state.online || state.pending.is_empty() {
                drop(state);
                shared.syncing.store(false, Ordering::SeqCst);
                return;
            }
            self.publish(&state);
            state.pending.iter().map(|t| t.id.clone()).collect()
        };

        for (i, id) in ids.iter().enumerate() {
            if i > 0 && !shared.options.inter_item_delay.is_zero() {
                tokio::time::sleep(shared.options.inter_item_delay).await;
            }
            let record = {
                let state = shared.state.lock().await;
                match state.pending.iter().find(|t| t.id == *id) {
                    Some(item) => DonationRecord::from(item),
                    None => continue,
                }
            };
            // No idempotency key: an insert acked server-side but lost on the
            // wire will be resubmitted on the next pass.
            match shared.remote.insert_donation(&record).await {
                Ok(()) => {
                    let mut state = shared.state.lock().await;
                    state.clear_synced(id);
                    info!(id = %id, "pending donation synced");
                    self.persist(&state).await;
                    self.publish(&state);
                }
                Err(err) => {
                    let mut state = shared.state.lock().await;
                    let attempts = state.record_failure(id, &err);
                    warn!(?err, id = %id, attempts, "pending donation failed to sync");
                    self.persist(&state).await;
                    self.publish(&state);
                }
            }
        }

        // Marks "a flush pass completed", not "all items synced".
        let mut state = shared.state.lock().await;
        state.last_sync_at = Some(Utc::now());
        self.persist(&state).await;
        shared.syncing.store(false, Ordering::SeqCst);
        self.publish(&state);
    }

    fn schedule_flush(&self, delay: Duration) {
        let queue = self.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            queue.sync_pending_transactions().await;
        });
    }

    async fn persist(&self, state: &Inner) {
        let snapshot = PersistedQueue {
            pending: state.pending.clone(),
            last_sync_at: state.last_sync_at,
        };
        let raw = match serde_json::to_string(&snapshot) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(?err, "failed to encode queue snapshot");
                return;
            }
        };
        if let Err(err) = self.shared.storage.save(&raw).await {
            warn!(?err, "failed to persist queue snapshot");
        }
    }

    fn publish(&self, state: &Inner) {
        self.shared
            .watch_tx
            .send_replace(state.snapshot(self.shared.syncing.load(Ordering::SeqCst)));
    }
}
