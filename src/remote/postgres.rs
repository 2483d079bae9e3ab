use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::RemoteError;
use super::RemoteSubscriberStore;
use crate::configuration::DatabaseSettings;

/// Subscribers table in a Postgres database we can reach directly (see
/// `migrations/`). `email` carries a UNIQUE constraint.
pub struct PgSubscriberStore {
    pool: PgPool,
}

impl PgSubscriberStore {
    /// Lazy: no connection is made until the first drain, so an unreachable
    /// database only ever shows up as a failed (and retried) insert
    pub fn new(db_cfg: &DatabaseSettings) -> Self {
        Self {
            pool: PgPoolOptions::new().connect_lazy_with(db_cfg.connection()),
        }
    }

    pub fn with_pool(pool: PgPool) -> Self { Self { pool } }
}

impl RemoteSubscriberStore for PgSubscriberStore {
    #[tracing::instrument(name = "INSERTing subscriber into remote db", skip(self))]
    async fn insert(
        &self,
        email: &str,
    ) -> Result<(), RemoteError> {
        // runtime-checked query; `query!` would need a live db (or `.sqlx`) at
        // compile time
        sqlx::query(
            "
    INSERT INTO subscribers (email, subscribed_at)
    VALUES ($1, $2)
",
        )
        .bind(email)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match is_unique_violation(&e) {
            true => RemoteError::AlreadyPresent,
            false => RemoteError::Unexpected(e.into()),
        })?;
        Ok(())
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505")
    )
}
