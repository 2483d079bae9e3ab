mod postgres;
mod rest;

use std::fmt::Debug;
use std::future::Future;

use anyhow::Context;
pub use postgres::PgSubscriberStore;
pub use rest::RestSubscriberStore;

use crate::configuration::RemoteSettings;
use crate::utils::error_chain_fmt;

#[derive(thiserror::Error)]
pub enum RemoteError {
    /// The email column is unique, and this email is already in it
    #[error("Email is already present upstream")]
    AlreadyPresent,
    #[error("Insert was rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl Debug for RemoteError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// The opaque upstream table of subscribers. Implementors only report what
/// happened; deciding what counts as "synced" is left to `insert_subscriber`.
pub trait RemoteSubscriberStore: Send + Sync {
    fn insert(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    /// `true` iff the email is now known to be present upstream
    pub success: bool,
}

/// Push one email upstream. Never fails: a fresh insert and a uniqueness
/// violation both mean the email is present upstream (`success`); anything
/// else, including having no remote configured at all, is logged and reported
/// as `!success`, to be retried on a later drain.
#[tracing::instrument(name = "Inserting subscriber upstream", skip(remote))]
pub async fn insert_subscriber<R: RemoteSubscriberStore>(
    remote: Option<&R>,
    email: &str,
) -> InsertOutcome {
    let Some(remote) = remote else {
        tracing::debug!("no remote store configured");
        return InsertOutcome { success: false };
    };

    match remote.insert(email).await {
        Ok(()) => InsertOutcome { success: true },
        Err(RemoteError::AlreadyPresent) => {
            tracing::info!("already present upstream, treating as synced");
            InsertOutcome { success: true }
        }
        Err(e) => {
            tracing::warn!(
                error.cause_chain=?e,
                error.message=%e,
                "could not insert subscriber upstream"
            );
            InsertOutcome { success: false }
        }
    }
}

/// The remote store selected in configuration
pub enum RemoteBackend {
    Rest(RestSubscriberStore),
    Postgres(PgSubscriberStore),
}

impl RemoteBackend {
    pub fn from_settings(settings: RemoteSettings) -> Result<Self, anyhow::Error> {
        let backend = match settings {
            RemoteSettings::Rest(rest) => {
                Self::Rest(rest.client().context("could not build remote http client")?)
            }
            RemoteSettings::Postgres(db) => Self::Postgres(PgSubscriberStore::new(&db)),
        };
        Ok(backend)
    }
}

impl RemoteSubscriberStore for RemoteBackend {
    async fn insert(
        &self,
        email: &str,
    ) -> Result<(), RemoteError> {
        match self {
            Self::Rest(store) => store.insert(email).await,
            Self::Postgres(store) => store.insert(email).await,
        }
    }
}
