use subscriber_outbox::domain::PendingSubscriber;

use crate::helpers::spawn_app_without_remote;

/// A snapshot goes back in verbatim, replacing whatever was there
#[tokio::test]
async fn restore_snapshot() {
    let app = spawn_app_without_remote().await;
    app.subscribe("new@x.com").await.error_for_status().unwrap();

    let snapshot = vec![
        PendingSubscriber {
            email: "old@x.com".to_string(),
            captured_at_epoch_millis: 1_700_000_000_000,
            synced: true,
        },
        PendingSubscriber {
            email: "older@x.com".to_string(),
            captured_at_epoch_millis: 1_600_000_000_000,
            synced: false,
        },
    ];
    let resp = app.put_subscriptions(&snapshot).await;
    assert_eq!(resp.status().as_u16(), 204);

    assert_eq!(app.get_subscriptions().await, snapshot);
}

/// Restored records are subject to the usual dedup on the next subscribe
#[tokio::test]
async fn restored_email_is_not_captured_again() {
    let app = spawn_app_without_remote().await;
    let snapshot = vec![PendingSubscriber {
        email: "old@x.com".to_string(),
        captured_at_epoch_millis: 1,
        synced: true,
    }];
    app.put_subscriptions(&snapshot)
        .await
        .error_for_status()
        .unwrap();

    app.subscribe("old@x.com").await.error_for_status().unwrap();
    assert_eq!(app.get_subscriptions().await, snapshot);
}

#[tokio::test]
async fn restore_rejects_malformed_snapshot() {
    let app = spawn_app_without_remote().await;
    let resp = reqwest::Client::new()
        .put(format!("{}/subscriptions", app.addr))
        .json(&serde_json::json!([{ "email": "a@x.com" }]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}
