use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::domain::PendingSubscriber;
use crate::domain::SubscriberEmail;
use crate::kv_store::KeyValueStore;
use crate::local_store::AppendOutcome;
use crate::local_store::LocalSubscriberStore;
use crate::local_store::StoreError;
use crate::remote::RemoteSubscriberStore;
use crate::sync::SyncCoordinator;
use crate::sync::SyncOutcome;

/// What screens call. Subscribing is "done" as soon as the email is durably
/// saved locally; getting it upstream is a background concern that the user
/// never waits on or hears about.
pub struct SubscriptionService<S, R> {
    store: Arc<LocalSubscriberStore<S>>,
    coordinator: Arc<SyncCoordinator<S, R>>,
}

impl<S, R> SubscriptionService<S, R>
where
    S: KeyValueStore + 'static,
    R: RemoteSubscriberStore + 'static,
{
    pub fn new(coordinator: Arc<SyncCoordinator<S, R>>) -> Self {
        Self {
            store: coordinator.store(),
            coordinator,
        }
    }

    pub fn coordinator(&self) -> Arc<SyncCoordinator<S, R>> { self.coordinator.clone() }

    /// Save locally, then kick off a drain without waiting for it. Only a
    /// failed local save is an error; if that happens no drain is started.
    #[tracing::instrument(name = "Subscribing", skip(self, email), fields(subscriber_email = %email))]
    pub async fn subscribe(
        &self,
        email: SubscriberEmail,
    ) -> Result<AppendOutcome, StoreError> {
        let outcome = self.store.append(&email).await?;
        // fire and forget
        drop(self.coordinator.trigger());
        Ok(outcome)
    }

    /// App came to the foreground (or a screen gained focus)
    pub fn on_foreground(&self) -> JoinHandle<SyncOutcome> { self.coordinator.trigger() }

    pub async fn list_all(&self) -> Result<Vec<PendingSubscriber>, StoreError> {
        self.store.list_all().await
    }

    /// Put back a previously exported snapshot, e.g. to undo a reset
    pub async fn restore(
        &self,
        records: Vec<PendingSubscriber>,
    ) -> Result<(), StoreError> {
        self.store.replace_all(records).await
    }
}
