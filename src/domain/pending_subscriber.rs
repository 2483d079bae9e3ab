use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::SubscriberEmail;

/// One locally captured email address, and whether it has been confirmed
/// present upstream.
///
/// Records are never deleted; once `synced` is `true` it stays `true`, and the
/// record remains as an audit trail.
///
/// The whole collection is persisted as a single JSON array, e.g.
///
/// ```json
/// [{"email":"a@x.com","capturedAtEpochMillis":1713858503364,"synced":false}]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSubscriber {
    pub email: String,
    pub captured_at_epoch_millis: i64,
    pub synced: bool,
}

impl PendingSubscriber {
    /// Unsynced record stamped with the current time
    pub fn capture(email: &SubscriberEmail) -> Self {
        Self {
            email: email.as_ref().to_owned(),
            captured_at_epoch_millis: Utc::now().timestamp_millis(),
            synced: false,
        }
    }
}
