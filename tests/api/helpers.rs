use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::Lazy;
use secrecy::Secret;
use subscriber_outbox::configuration::get_configuration;
use subscriber_outbox::configuration::RemoteSettings;
use subscriber_outbox::configuration::RestSettings;
use subscriber_outbox::domain::PendingSubscriber;
use subscriber_outbox::startup::Application;
use subscriber_outbox::telemetry::get_subscriber;
use subscriber_outbox::telemetry::init_subscriber;
use uuid::Uuid;
use wiremock::MockServer;

/// Init the tracing subscriber once only.
///
/// To opt in to verbose logging, use the env var `TEST_LOG`:
///
/// ```sh
///      TEST_LOG=true cargo test [test_name] | bunyan
/// ```
static TRACING: Lazy<()> = Lazy::new(|| {
    // `get_subscriber` is generic over the sink, so the two arms can't share a
    // variable
    match std::env::var("TEST_LOG") {
        Ok(_) => {
            let subscriber = get_subscriber("test", "debug", std::io::stdout);
            init_subscriber(subscriber).unwrap();
        }
        Err(_) => {
            let subscriber = get_subscriber("test", "debug", std::io::sink);
            init_subscriber(subscriber).unwrap();
        }
    };
});

pub struct TestApp {
    pub addr: String,
    /// Stands in for the remote subscribers table
    pub remote_server: MockServer,
    /// Where this app's local store lives; unique per test
    pub storage_dir: PathBuf,
    api_client: reqwest::Client,
}

impl TestApp {
    /// `POST /subscriptions` with a urlencoded form body
    pub async fn post_subscriptions(
        &self,
        body: String,
    ) -> reqwest::Response {
        self.api_client
            .post(format!("{}/subscriptions", self.addr))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .expect("execute request")
    }

    /// Convenience for a valid single-email subscription
    pub async fn subscribe(
        &self,
        email: &str,
    ) -> reqwest::Response {
        let body = serde_urlencoded::to_string([("email", email)]).unwrap();
        self.post_subscriptions(body).await
    }

    pub async fn get_subscriptions(&self) -> Vec<PendingSubscriber> {
        self.api_client
            .get(format!("{}/subscriptions", self.addr))
            .send()
            .await
            .expect("execute request")
            .error_for_status()
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    pub async fn put_subscriptions(
        &self,
        records: &[PendingSubscriber],
    ) -> reqwest::Response {
        self.api_client
            .put(format!("{}/subscriptions", self.addr))
            .json(records)
            .send()
            .await
            .expect("execute request")
    }

    pub async fn post_sync(&self) -> reqwest::Response {
        self.api_client
            .post(format!("{}/sync", self.addr))
            .send()
            .await
            .expect("execute request")
    }

    /// Drains run detached, so poll the local store until `done` holds (or
    /// give up after a few seconds)
    pub async fn wait_for<F>(
        &self,
        done: F,
    ) -> Vec<PendingSubscriber>
    where
        F: Fn(&[PendingSubscriber]) -> bool,
    {
        for _ in 0..100 {
            let records = self.get_subscriptions().await;
            if done(&records) {
                return records;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("local store never reached the expected state");
    }

    /// Like `wait_for`, but keeps poking `POST /sync`: a trigger that lands
    /// while the previous drain is still winding down is dropped
    pub async fn sync_until<F>(
        &self,
        done: F,
    ) -> Vec<PendingSubscriber>
    where
        F: Fn(&[PendingSubscriber]) -> bool,
    {
        for _ in 0..100 {
            self.post_sync().await.error_for_status().unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            let records = self.get_subscriptions().await;
            if done(&records) {
                return records;
            }
        }
        panic!("local store never reached the expected state");
    }

    /// Emails the remote has been asked to insert, in order
    pub async fn remote_inserts(&self) -> Vec<String> {
        self.remote_server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| {
                let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
                body["email"].as_str().unwrap().to_string()
            })
            .collect()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) { let _ = std::fs::remove_dir_all(&self.storage_dir); }
}

/// Spawn the app with a mock remote table, an empty local store in a fresh
/// directory, and a random port.
pub async fn spawn_app() -> TestApp { spawn(true).await }

/// Same, but with no remote configured at all
pub async fn spawn_app_without_remote() -> TestApp { spawn(false).await }

async fn spawn(with_remote: bool) -> TestApp {
    Lazy::force(&TRACING);

    let remote_server = MockServer::start().await;
    let storage_dir = std::env::temp_dir().join(format!("outbox-test-{}", Uuid::new_v4()));

    let cfg = {
        let mut cfg = get_configuration().unwrap();

        // port 0 is reserved by the OS; the server will be spawned on a random
        // available port, made known through `Application::get_port`
        cfg.application.port = 0;
        cfg.storage.directory = storage_dir.clone();
        cfg.remote = with_remote.then(|| {
            RemoteSettings::Rest(RestSettings {
                base_url: remote_server.uri(),
                table: "subscribers".to_string(),
                api_key: Secret::new("test-key".to_string()),
                timeout_milliseconds: 2000,
            })
        });
        cfg
    };

    let app = Application::build(cfg).await.unwrap();
    let addr = format!("http://127.0.0.1:{}", app.get_port());
    tokio::spawn(app.run_until_stopped());

    TestApp {
        addr,
        remote_server,
        storage_dir,
        api_client: reqwest::Client::new(),
    }
}
