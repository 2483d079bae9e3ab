use std::fmt::Debug;

use tokio::sync::Mutex;

use crate::domain::PendingSubscriber;
use crate::domain::SubscriberEmail;
use crate::kv_store::KeyValueStore;
use crate::utils::error_chain_fmt;

/// Key under which the whole collection is stored, unless configured otherwise
pub const DEFAULT_STORAGE_KEY: &str = "pending_subscribers";

#[derive(thiserror::Error)]
pub enum StoreError {
    #[error("Could not read local subscribers")]
    Read(#[source] anyhow::Error),
    #[error("Could not persist local subscribers")]
    Write(#[source] anyhow::Error),
    #[error("Local subscribers blob is corrupt")]
    Corrupt(#[from] serde_json::Error),
}

impl Debug for StoreError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Captured,
    /// Exact same email already stored; nothing was written
    AlreadyCaptured,
}

/// Durable local record of every email a user has submitted; the source of
/// truth until an email is confirmed upstream.
///
/// Every operation is a full read followed (possibly) by a full rewrite of the
/// serialized collection. Mutations are serialised through `write_lock`, so two
/// concurrent appends cannot both read the same snapshot and drop each other's
/// record.
pub struct LocalSubscriberStore<S> {
    kv: S,
    key: String,
    write_lock: Mutex<()>,
}

impl<S: KeyValueStore> LocalSubscriberStore<S> {
    pub fn new(
        kv: S,
        key: impl Into<String>,
    ) -> Self {
        Self {
            kv,
            key: key.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> Result<Vec<PendingSubscriber>, StoreError> {
        let blob = self.kv.get(&self.key).await.map_err(StoreError::Read)?;
        match blob {
            None => Ok(vec![]),
            Some(blob) => Ok(serde_json::from_str(&blob)?),
        }
    }

    async fn write(
        &self,
        records: &[PendingSubscriber],
    ) -> Result<(), StoreError> {
        let blob = serde_json::to_string(records)?;
        self.kv
            .set(&self.key, blob)
            .await
            .map_err(StoreError::Write)
    }

    async fn try_append(
        &self,
        email: &SubscriberEmail,
    ) -> Result<AppendOutcome, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.read().await?;
        if records.iter().any(|r| r.email == email.as_ref()) {
            return Ok(AppendOutcome::AlreadyCaptured);
        }
        records.push(PendingSubscriber::capture(email));
        self.write(&records).await?;
        Ok(AppendOutcome::Captured)
    }

    /// Capture `email` unless an identical one is already stored. A duplicate
    /// is not an error.
    ///
    /// Failures are logged and returned; callers must not trigger a sync for
    /// an email that was not durably saved.
    #[tracing::instrument(name = "Saving subscriber locally", skip(self))]
    pub async fn append(
        &self,
        email: &SubscriberEmail,
    ) -> Result<AppendOutcome, StoreError> {
        let result = self.try_append(email).await;
        match &result {
            Ok(AppendOutcome::AlreadyCaptured) => tracing::info!("already captured, ignoring"),
            Ok(AppendOutcome::Captured) => {}
            Err(e) => tracing::error!(
                error.cause_chain=?e,
                error.message=%e,
                "could not save subscriber"
            ),
        }
        result
    }

    /// Every record, synced or not, in insertion order
    #[tracing::instrument(name = "Listing local subscribers", skip(self))]
    pub async fn list_all(&self) -> Result<Vec<PendingSubscriber>, StoreError> { self.read().await }

    /// Flip `synced` on every record matching `email`. Does not write anything
    /// if there is no match.
    #[tracing::instrument(name = "Marking subscriber synced", skip(self))]
    pub async fn mark_synced(
        &self,
        email: &str,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let records = self.read().await?;
        if !records.iter().any(|r| r.email == email) {
            return Ok(());
        }
        let records: Vec<PendingSubscriber> = records
            .into_iter()
            .map(|r| match r.email == email {
                true => PendingSubscriber { synced: true, ..r },
                false => r,
            })
            .collect();
        self.write(&records).await
    }

    /// Overwrite the whole collection verbatim. Only meant for restoring a
    /// snapshot; the subscribe and sync paths never call this.
    #[tracing::instrument(name = "Replacing local subscribers", skip_all, fields(count = records.len()))]
    pub async fn replace_all(
        &self,
        records: Vec<PendingSubscriber>,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.write(&records).await
    }
}
