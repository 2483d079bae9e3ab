use std::net::TcpListener;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::web;
use actix_web::App;
use actix_web::HttpServer;
use tracing_actix_web::TracingLogger;

use crate::configuration::Settings;
use crate::kv_store::FileKeyValueStore;
use crate::local_store::LocalSubscriberStore;
use crate::remote::RemoteBackend;
use crate::routes::health_check;
use crate::routes::list_subscriptions;
use crate::routes::restore_subscriptions;
use crate::routes::subscribe;
use crate::routes::trigger_sync;
use crate::subscription::SubscriptionService;
use crate::sync::SyncCoordinator;

/// The concrete service the HTTP surface runs on
pub type Subscriptions = SubscriptionService<FileKeyValueStore, RemoteBackend>;
pub type Coordinator = SyncCoordinator<FileKeyValueStore, RemoteBackend>;

/// Wrapper for actix's `Server` with access to the bound port, plus the one
/// sync coordinator every trigger in the process shares. Not to be confused
/// with actix's `App`!
pub struct Application {
    /// Left private; use `get_port` to access
    port: u16,
    server: Server,
    coordinator: Arc<Coordinator>,
}

impl Application {
    /// Open the local store, pick the remote (if any), and bind the server
    pub async fn build(cfg: Settings) -> Result<Self, anyhow::Error> {
        let addr = format!("{}:{}", cfg.application.host, cfg.application.port);
        let listener = TcpListener::bind(addr)?;
        // port 0 -> random port assigned by the OS
        let port = listener.local_addr()?.port();

        let store = Arc::new(LocalSubscriberStore::new(
            FileKeyValueStore::new(cfg.storage.directory),
            cfg.storage.key,
        ));

        let remote = cfg
            .remote
            .map(RemoteBackend::from_settings)
            .transpose()?;
        if remote.is_none() {
            tracing::warn!("no remote configured; subscribers will only be captured locally");
        }

        let coordinator = Arc::new(SyncCoordinator::new(store, remote));
        let service = SubscriptionService::new(coordinator.clone());

        let server = run(listener, service)?;

        Ok(Self {
            port,
            server,
            coordinator,
        })
    }

    pub fn get_port(&self) -> u16 { self.port }

    /// For the background sync worker, which must share the re-entrancy guard
    /// with the HTTP triggers
    pub fn coordinator(&self) -> Arc<Coordinator> { self.coordinator.clone() }

    /// Because this consumes `self`, this should be the final function call (or
    /// passed to `tokio::spawn`)
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> { self.server.await }
}

/// The server is not responsible for binding to an address, it only listens to
/// an already bound address.
///
/// Declares all API endpoints.
pub fn run(
    listener: TcpListener,
    service: Subscriptions,
) -> Result<Server, anyhow::Error> {
    // `Data` is an `Arc` inside; every worker's `App` shares the one service
    let service = web::Data::new(service);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .route("/subscriptions", web::post().to(subscribe))
            .route("/subscriptions", web::get().to(list_subscriptions))
            .route("/subscriptions", web::put().to(restore_subscriptions))
            .route("/sync", web::post().to(trigger_sync))
            .app_data(service.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
