//! Local-first email capture with a background sync queue.
//!
//! A subscribe action writes the email to the [`local_store`] first (the source
//! of truth), then nudges the [`sync`] coordinator, which pushes every unsynced
//! record to the remote subscribers table. The remote rejects duplicates via a
//! unique constraint, and that rejection counts as "synced", so retries and
//! overlapping drains from other devices are harmless.
//!
//! Screens reach this through [`subscription::SubscriptionService`], either
//! directly or via the small HTTP surface in [`routes`].

pub mod configuration;
pub mod domain;
pub mod kv_store;
pub mod local_store;
pub mod remote;
pub mod routes;
pub mod startup;
pub mod subscription;
pub mod sync;
pub mod telemetry;
pub mod utils;
