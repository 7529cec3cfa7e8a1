//! Prometheus metrics helpers for the keyharvest system.
//!
//! This module provides centralized metrics initialization and the metric
//! definitions used across keyharvest components.
//!
//! # Usage
//!
//! ```rust,ignore
//! use keyharvest_core::metrics::{init_metrics, start_metrics_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let handle = init_metrics();
//!     start_metrics_server(9090, handle).await.unwrap();
//!
//!     use metrics::counter;
//!     counter!("harvest_identities_total").increment(1);
//! }
//! ```
//!
//! # Naming conventions
//!
//! - Prefix: component name (`harvest_`, `store_`)
//! - Suffix: unit or type (`_total`, `_seconds`)
//! - Labels: used sparingly (`reason` on skip counters)

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Initialize the Prometheus metrics recorder.
///
/// Must be called once at startup before any metrics are recorded. Returns a
/// handle for [`start_metrics_server`].
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_common_metrics();

    handle
}

/// Try to initialize the Prometheus metrics recorder.
///
/// Like [`init_metrics`] but returns `None` if a recorder is already
/// installed, instead of panicking. Useful for tests.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    PrometheusBuilder::new().install_recorder().ok()
}

/// Start the Prometheus metrics HTTP server.
///
/// Serves the `/metrics` endpoint on the given port. Spawns a background
/// task and returns immediately.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        axum::serve(listener, app).await.unwrap();
    });

    Ok(())
}

/// Register descriptions for the metrics used across keyharvest.
///
/// Called automatically by [`init_metrics`].
fn register_common_metrics() {
    describe_counter!(
        "harvest_identities_total",
        "Identities yielded by sources (before dedup/filtering)"
    );
    describe_counter!(
        "harvest_identities_processed_total",
        "Identities that reached the key-fetch step"
    );
    describe_counter!(
        "harvest_identities_skipped_total",
        "Identities skipped before key fetch (label: reason)"
    );
    describe_counter!(
        "harvest_keys_stored_total",
        "Public key entries written to the sink"
    );
    describe_counter!(
        "harvest_store_errors_total",
        "Sink write failures (logged, pass continues)"
    );
    describe_counter!(
        "harvest_polls_total",
        "Completed activity-stream poll cycles"
    );
    describe_counter!(
        "harvest_rate_limit_total",
        "Rate-limit responses from the upstream API"
    );
    describe_counter!(
        "harvest_source_errors_total",
        "Transient source errors during stream polling"
    );
    describe_gauge!(
        "harvest_running",
        "Whether the ingestion daemon is running (1=yes, 0=no)"
    );
    describe_gauge!(
        "store_keys_approximate",
        "Approximate number of public keys in the durable store"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Once;

    static INIT: Once = Once::new();

    fn ensure_metrics_init() {
        INIT.call_once(|| {
            let _ = try_init_metrics();
        });
    }

    #[test]
    fn test_try_init_metrics_idempotent() {
        let handle1 = try_init_metrics();
        let handle2 = try_init_metrics();

        // At most one install can succeed
        assert!(handle1.is_none() || handle2.is_none());
    }

    #[test]
    fn test_register_common_metrics_idempotent() {
        ensure_metrics_init();
        register_common_metrics();
        register_common_metrics();
    }
}
