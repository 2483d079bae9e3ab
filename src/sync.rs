use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::kv_store::KeyValueStore;
use crate::local_store::LocalSubscriberStore;
use crate::remote::insert_subscriber;
use crate::remote::RemoteSubscriberStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Draining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another drain was running; this call did nothing
    AlreadyDraining,
    /// Local records could not be read; nothing was attempted
    StoreUnavailable,
    Drained { attempted: usize, synced: usize },
}

impl SyncOutcome {
    /// Records confirmed upstream during this call
    pub fn synced(&self) -> usize {
        match self {
            Self::Drained { synced, .. } => *synced,
            _ => 0,
        }
    }
}

/// Holds the draining flag for as long as it lives. Resetting happens in
/// `Drop`, so the flag is cleared on every exit from a drain, including a
/// panic unwinding out of the remote adapter.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) { self.0.store(false, Ordering::Release) }
}

/// Pushes unsynced local records upstream. Construct one per process and share
/// it (`Arc`) with everything that triggers a sync.
///
/// At most one drain runs at a time; a trigger that arrives mid-drain is
/// dropped rather than queued, since whatever it would have synced is picked up
/// by the next trigger.
pub struct SyncCoordinator<S, R> {
    store: Arc<LocalSubscriberStore<S>>,
    /// `None` when no remote is configured; every record then stays unsynced
    remote: Option<R>,
    draining: AtomicBool,
}

impl<S, R> SyncCoordinator<S, R>
where
    S: KeyValueStore + 'static,
    R: RemoteSubscriberStore + 'static,
{
    pub fn new(
        store: Arc<LocalSubscriberStore<S>>,
        remote: Option<R>,
    ) -> Self {
        Self {
            store,
            remote,
            draining: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> Arc<LocalSubscriberStore<S>> { self.store.clone() }

    pub fn state(&self) -> SyncState {
        match self.draining.load(Ordering::Acquire) {
            true => SyncState::Draining,
            false => SyncState::Idle,
        }
    }

    /// Attempt every unsynced record once, sequentially, in insertion order.
    ///
    /// A record that fails upstream is left unsynced and does not stop the
    /// drain. Nothing here returns an error; failures are logged and retried
    /// on a later call.
    #[tracing::instrument(
        name = "Draining unsynced subscribers",
        skip_all,
        fields(
            attempted=tracing::field::Empty,
            synced=tracing::field::Empty,
        )
    )]
    pub async fn start_sync(&self) -> SyncOutcome {
        let Some(_guard) = DrainGuard::acquire(&self.draining) else {
            tracing::debug!("drain already in progress, skipping");
            return SyncOutcome::AlreadyDraining;
        };

        let records = match self.store.list_all().await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(
                    error.cause_chain=?e,
                    error.message=%e,
                    "could not list local subscribers, aborting drain"
                );
                return SyncOutcome::StoreUnavailable;
            }
        };

        let pending: Vec<String> = records
            .into_iter()
            .filter(|r| !r.synced)
            .map(|r| r.email)
            .collect();

        let mut synced = 0;
        for email in &pending {
            if !insert_subscriber(self.remote.as_ref(), email).await.success {
                continue;
            }
            // an unmarked record is simply pushed again next time, which the
            // remote absorbs as a uniqueness violation
            match self.store.mark_synced(email).await {
                Ok(()) => synced += 1,
                Err(e) => tracing::error!(
                    error.cause_chain=?e,
                    error.message=%e,
                    "synced {email} upstream but could not mark it locally"
                ),
            }
        }

        tracing::Span::current()
            .record("attempted", pending.len())
            .record("synced", synced);

        SyncOutcome::Drained {
            attempted: pending.len(),
            synced,
        }
    }

    /// Start a drain on a detached task and return immediately. The handle can
    /// be dropped; it is only returned so that callers (and tests) may observe
    /// the outcome.
    pub fn trigger(self: &Arc<Self>) -> JoinHandle<SyncOutcome> {
        let coordinator = self.clone();
        tokio::spawn(
            async move { coordinator.start_sync().await }
                .instrument(tracing::info_span!("Background sync trigger")),
        )
    }
}

/// To be run as a separate worker alongside the API. Drains on a fixed
/// interval, so records captured while offline go out without waiting for the
/// next subscribe or foreground event.
pub async fn run_sync_worker<S, R>(
    coordinator: Arc<SyncCoordinator<S, R>>,
    interval: Duration,
) -> Result<(), anyhow::Error>
where
    S: KeyValueStore + 'static,
    R: RemoteSubscriberStore + 'static,
{
    loop {
        // each tick is its own task: a panic in the remote adapter ends that
        // drain, not the worker
        if let Err(e) = coordinator.trigger().await {
            tracing::error!(
                error.cause_chain=?e,
                error.message=%e,
                "periodic drain did not complete"
            );
        }
        tokio::time::sleep(interval).await;
    }
}
