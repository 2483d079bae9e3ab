use wiremock::matchers::body_json;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::ResponseTemplate;

use crate::helpers::spawn_app;
use crate::helpers::spawn_app_without_remote;
use crate::helpers::TestApp;

async fn remote_accepts(app: &TestApp) {
    Mock::given(path("/rest/v1/subscribers"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&app.remote_server)
        .await;
}

fn unique_violation() -> ResponseTemplate {
    ResponseTemplate::new(409).set_body_json(serde_json::json!({
        "code": "23505",
        "details": "Key (email)=(foo@bar.com) already exists.",
        "hint": null,
        "message": "duplicate key value violates unique constraint \"subscribers_email_key\""
    }))
}

/// subscribe -> 1 unsynced -> synced upstream -> another trigger makes no
/// further remote calls
#[tokio::test]
async fn subscribe_then_sync() {
    let app = spawn_app().await;
    remote_accepts(&app).await;

    app.subscribe("a@x.com").await.error_for_status().unwrap();

    let records = app
        .wait_for(|records| records.len() == 1 && records[0].synced)
        .await;
    assert_eq!(records[0].email, "a@x.com");
    assert_eq!(app.remote_inserts().await, ["a@x.com"]);

    let resp = app.post_sync().await;
    assert_eq!(resp.status().as_u16(), 202);
    // give the detached drain time to (not) do anything
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(app.remote_inserts().await.len(), 1);
}

/// The remote already has this email (another device, or an earlier drain whose
/// local mark was lost): that is as good as a fresh insert
#[tokio::test]
async fn already_upstream_counts_as_synced() {
    let app = spawn_app().await;
    Mock::given(path("/rest/v1/subscribers"))
        .and(method("POST"))
        .respond_with(unique_violation())
        .mount(&app.remote_server)
        .await;

    app.subscribe("foo@bar.com").await.error_for_status().unwrap();

    app.wait_for(|records| records[0].synced).await;
}

/// A: ok, B: server error, C: ok. One drain syncs A and C; B waits for a later
/// trigger.
#[tokio::test]
async fn failed_record_is_retried_later() {
    let app = spawn_app_without_remote().await;
    for email in ["a@x.com", "b@x.com", "c@x.com"] {
        app.subscribe(email).await.error_for_status().unwrap();
    }
    let captured = app.get_subscriptions().await;
    drop(app);

    // same records, now with a remote that fails for b
    let app = spawn_app().await;
    app.put_subscriptions(&captured)
        .await
        .error_for_status()
        .unwrap();

    let b_fails = Mock::given(path("/rest/v1/subscribers"))
        .and(body_json(serde_json::json!({ "email": "b@x.com" })))
        .respond_with(ResponseTemplate::new(503))
        .mount_as_scoped(&app.remote_server)
        .await;
    remote_accepts(&app).await;

    app.post_sync().await.error_for_status().unwrap();
    let records = app
        .wait_for(|records| records[0].synced && records[2].synced)
        .await;
    assert!(!records[1].synced);

    // b recovers
    drop(b_fails);
    app.sync_until(|records| records.iter().all(|r| r.synced))
        .await;

    let inserts = app.remote_inserts().await;
    assert_eq!(inserts.iter().filter(|e| *e == "a@x.com").count(), 1);
    assert_eq!(inserts.iter().filter(|e| *e == "b@x.com").count(), 2);
    assert_eq!(inserts.iter().filter(|e| *e == "c@x.com").count(), 1);
}

/// No remote configured is a normal condition: subscribing works, syncing is a
/// silent no-op
#[tokio::test]
async fn no_remote_configured() {
    let app = spawn_app_without_remote().await;
    app.subscribe("foo@bar.com").await.error_for_status().unwrap();

    let resp = app.post_sync().await;
    assert_eq!(resp.status().as_u16(), 202);
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let records = app.get_subscriptions().await;
    assert_eq!(records.len(), 1);
    assert!(!records[0].synced);
}
