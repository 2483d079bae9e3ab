use std::time::Duration;

use anyhow::Context;
use reqwest::Client;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use secrecy::Secret;
use serde::Deserialize;
use serde::Serialize;

use super::RemoteError;
use super::RemoteSubscriberStore;

/// Postgres SQLSTATE for `unique_violation`
const UNIQUE_VIOLATION: &str = "23505";

/// Hosted subscribers table behind a PostgREST-style API (e.g. Supabase).
///
/// The table is expected to have a unique `email` column; a duplicate insert
/// comes back as 409 with the SQLSTATE in the body.
pub struct RestSubscriberStore {
    http_client: Client,
    base_url: String,
    table: String,
    api_key: Secret<String>,
}

// establishing a HTTP connection is expensive, so one `Client` is kept for the
// lifetime of the store and reused across drains

#[derive(Serialize)]
struct InsertRequest<'a> {
    email: &'a str,
}

/// Error body returned by PostgREST
#[derive(Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

impl RestSubscriberStore {
    pub fn new(
        base_url: String,
        table: String,
        api_key: Secret<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        // a client without the timeout would let one stuck request hold the
        // drain forever, so a builder failure is fatal rather than defaulted
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
            table,
            api_key,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.base_url.trim_end_matches('/'),
            self.table
        )
    }
}

impl RemoteSubscriberStore for RestSubscriberStore {
    #[tracing::instrument(name = "POSTing subscriber to remote table", skip(self))]
    async fn insert(
        &self,
        email: &str,
    ) -> Result<(), RemoteError> {
        let resp = self
            .http_client
            .post(self.url())
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(self.api_key.expose_secret())
            .header("Prefer", "return=minimal")
            .json(&InsertRequest { email })
            .send()
            .await
            .context("could not reach remote store")?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        // the body is only informative; a missing or non-json body must not
        // hide the status
        let body: Option<ErrorBody> = resp.json().await.ok();
        let code = body.as_ref().and_then(|b| b.code.as_deref());
        let message = body
            .as_ref()
            .and_then(|b| b.message.clone())
            .unwrap_or_else(|| status.to_string());

        match status {
            StatusCode::CONFLICT if code == Some(UNIQUE_VIOLATION) => Err(RemoteError::AlreadyPresent),
            s if s.is_client_error() => Err(RemoteError::Rejected(message)),
            s => Err(anyhow::anyhow!("remote store returned {s}: {message}").into()),
        }
    }
}
