use std::fmt::Debug;
use std::fmt::Display;

use subscriber_outbox::configuration::get_configuration;
use subscriber_outbox::startup::Application;
use subscriber_outbox::sync::run_sync_worker;
use subscriber_outbox::telemetry::get_subscriber;
use subscriber_outbox::telemetry::init_subscriber;
use tokio::task::JoinError;

fn report_exit(
    name: &str,
    outcome: Result<Result<(), impl Debug + Display>, JoinError>,
) {
    match outcome {
        Ok(Ok(())) => {
            tracing::info!("{name} exited gracefully")
        }

        Ok(Err(e)) => {
            tracing::error!(
                error.cause_chain=?e,
                error.message=%e,
                "{name} failed (inner)"
            )
        }

        Err(e) => {
            tracing::error!(
                error.cause_chain=?e,
                error.message=%e,
                "{name} failed (outer)"
            )
        }
    }
}

/// Initialise telemetry, load config, then run the API and the sync worker
/// until either stops
#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber("subscriber-outbox", "info", std::io::stdout);
    init_subscriber(subscriber)?;

    let cfg = get_configuration()?;
    let interval = cfg.sync.interval();

    let app = Application::build(cfg).await?;
    tracing::info!("listening on port {}", app.get_port());

    // the worker and the API must share one coordinator, otherwise their
    // drains could overlap
    let sync_worker = run_sync_worker(app.coordinator(), interval);

    let server_thread = tokio::spawn(app.run_until_stopped());
    let sync_worker_thread = tokio::spawn(sync_worker);

    // returns when the **first** branch completes, cancelling the other
    tokio::select! {
        o = server_thread => { report_exit("API", o) },
        o = sync_worker_thread => { report_exit("Background sync worker", o) },
    }

    Ok(())
}
