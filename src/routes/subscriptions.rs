use std::fmt::Debug;

use actix_web::http::StatusCode;
use actix_web::web;
use actix_web::HttpResponse;
use actix_web::ResponseError;
use serde::Deserialize;

use crate::domain::PendingSubscriber;
use crate::domain::SubscriberEmail;
use crate::local_store::StoreError;
use crate::startup::Subscriptions;
use crate::utils::error_500;
use crate::utils::error_chain_fmt;

#[derive(Deserialize)]
pub struct FormData {
    email: String,
}

impl TryFrom<FormData> for SubscriberEmail {
    type Error = String;
    fn try_from(value: FormData) -> Result<Self, Self::Error> { SubscriberEmail::parse(value.email) }
}

#[derive(thiserror::Error)]
pub enum SubscribeError {
    #[error("{0}")]
    ValidationError(String),
    /// Not saved locally; the user should try again
    #[error("Could not save subscription")]
    StoreError(#[from] StoreError),
}

impl Debug for SubscribeError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for SubscribeError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `POST /subscriptions`
///
/// Parses the email, saves it locally and starts a background sync. Responds
/// as soon as the local save is durable; submitting the same email again is
/// also a 200.
///
/// # Request example
///
/// ```sh
///     curl -v --data 'email=john@foo.com' http://127.0.0.1:8000/subscriptions
/// ```
#[tracing::instrument(
    name = "Adding new subscriber",
    skip(form, service),
    fields(subscriber_email = %form.email)
)]
pub async fn subscribe(
    form: web::Form<FormData>,
    service: web::Data<Subscriptions>,
) -> Result<HttpResponse, SubscribeError> {
    let email: SubscriberEmail = form.0.try_into().map_err(SubscribeError::ValidationError)?;
    service.subscribe(email).await?;
    Ok(HttpResponse::Ok().finish())
}

/// `GET /subscriptions`
///
/// Every locally captured record, synced or not, in the order captured
pub async fn list_subscriptions(
    service: web::Data<Subscriptions>
) -> Result<HttpResponse, actix_web::Error> {
    let records = service.list_all().await.map_err(error_500)?;
    Ok(HttpResponse::Ok().json(records))
}

/// `PUT /subscriptions`
///
/// Replace the whole local collection with the JSON array in the body. For
/// restoring an exported snapshot (e.g. undoing a reset); not part of the
/// normal subscribe flow.
#[tracing::instrument(name = "Restoring subscriber snapshot", skip_all)]
pub async fn restore_subscriptions(
    records: web::Json<Vec<PendingSubscriber>>,
    service: web::Data<Subscriptions>,
) -> Result<HttpResponse, actix_web::Error> {
    service
        .restore(records.into_inner())
        .await
        .map_err(error_500)?;
    Ok(HttpResponse::NoContent().finish())
}
