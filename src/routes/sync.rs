use actix_web::web;
use actix_web::HttpResponse;

use crate::startup::Subscriptions;

/// `POST /sync`
///
/// Sent by the app shell when it comes to the foreground (or a screen gains
/// focus). Starts a drain in the background and answers 202 straight away;
/// the outcome is only visible in the logs, and in `GET /subscriptions`.
///
/// ```sh
///     curl -v -X POST http://127.0.0.1:8000/sync
/// ```
#[tracing::instrument(name = "Foreground sync trigger", skip(service))]
pub async fn trigger_sync(service: web::Data<Subscriptions>) -> HttpResponse {
    // dropping the handle detaches the drain
    drop(service.on_foreground());
    HttpResponse::Accepted().finish()
}
