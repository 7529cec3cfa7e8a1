//! Keyharvest ingestion daemon.
//!
//! Harvests public keys from an organization's member listing and/or the
//! public activity stream, and persists them into a key-addressed store.
//!
//! # Usage
//!
//! ```bash
//! # One bounded pass over an organization's members
//! keyharvest-ingest --org acme --db ./data/keys
//!
//! # Poll the public events feed indefinitely
//! keyharvest-ingest --stream --db ./data/keys
//!
//! # Both, with the file-per-identity fallback instead of the store
//! keyharvest-ingest --org acme --stream --out-dir ./harvested
//! ```
//!
//! The API credential is read from the `GITHUB_TOKEN` environment variable.
//! SIGINT stops the stream loop at the next poll boundary.

use anyhow::{Context, Result, bail};
use clap::Parser;
use keyharvest_core::metrics::{init_metrics, start_metrics_server};
use keyharvest_ingest::{
    BackoffPolicy, GithubClient, GithubConfig, GithubKeyFetcher, Harvester, JsonDirSink, KeyFetch,
    KeySink, KeyStore, OrgMemberSource, PublicEventSource, ResumeCheck, TokioSleeper,
};
use metrics::gauge;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;

/// Public-key harvesting daemon.
#[derive(Parser, Debug)]
#[command(name = "keyharvest-ingest")]
#[command(about = "Harvest public keys from identity sources into a durable store")]
#[command(version)]
struct Args {
    /// Organization whose member listing to walk (one bounded pass)
    #[arg(long)]
    org: Option<String>,

    /// Poll the public events feed indefinitely
    #[arg(long)]
    stream: bool,

    /// Key store location
    #[arg(long)]
    db: Option<PathBuf>,

    /// Write one JSON file per identity instead of using the store
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// API base URL
    #[arg(long, default_value = "https://api.github.com")]
    api_url: String,

    /// Base URL for the per-user keys endpoint
    #[arg(long, default_value = "https://github.com")]
    keys_url: String,

    /// Metrics HTTP server port (0 to disable)
    #[arg(long, default_value = "9090")]
    metrics_port: u16,
}

/// Reject argument combinations that leave nothing to do or no single sink.
fn validate_args(args: &Args) -> Result<()> {
    if args.org.is_none() && !args.stream {
        bail!("nothing to do: pass --org and/or --stream");
    }
    if args.db.is_some() == args.out_dir.is_some() {
        bail!("exactly one of --db or --out-dir must be specified");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap())
                .add_directive("keyharvest_ingest=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    // Startup configuration errors are fatal before any pipeline work
    let token = std::env::var("GITHUB_TOKEN")
        .context("GITHUB_TOKEN environment variable must be set")?;
    validate_args(&args)?;

    if args.metrics_port > 0 {
        let handle = init_metrics();
        start_metrics_server(args.metrics_port, handle).await?;
        gauge!("harvest_running").set(1.0);
    }

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received, stopping at next poll boundary...");
        running_clone.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let api = GithubClient::new(GithubConfig {
        api_base: args.api_url.trim_end_matches('/').to_string(),
        token,
        ..Default::default()
    })?;
    let fetcher = GithubKeyFetcher::new(args.keys_url.as_str())?;

    if let Some(db_path) = &args.db {
        let store = KeyStore::open(db_path)?;
        tracing::info!(
            "Key store opened: ~{} keys",
            store.stats().approximate_keys
        );

        run_passes(&args, api, Harvester::new(fetcher, &store), &running).await;

        store.flush()?;
        let count = store.count()?;
        gauge!("store_keys_approximate").set(count as f64);
        tracing::info!("Total keys in store: {}", count);
    } else if let Some(out_dir) = &args.out_dir {
        let sink = JsonDirSink::new(out_dir)?;
        run_passes(&args, api, Harvester::new(fetcher, &sink), &running).await;
    }

    gauge!("harvest_running").set(0.0);
    Ok(())
}

/// Run the requested passes: the bounded membership walk first, then the
/// unbounded stream loop.
///
/// A failed membership pass is logged and does not prevent a requested
/// stream pass from starting.
async fn run_passes<F, K>(
    args: &Args,
    api: GithubClient,
    harvester: Harvester<F, K>,
    running: &AtomicBool,
) where
    F: KeyFetch,
    K: KeySink + ResumeCheck,
{
    if let Some(org) = &args.org {
        tracing::info!("Listing members of {}...", org);
        let mut source = OrgMemberSource::new(api.clone(), org.clone());
        match harvester.run_membership_pass(&mut source).await {
            Ok(stats) => tracing::info!(
                "Membership pass: {} identities, {} keys stored, {} skipped as recorded",
                stats.identities,
                stats.keys_stored,
                stats.already_recorded
            ),
            Err(e) => tracing::error!("Membership pass for {} failed: {}", org, e),
        }
    }

    if args.stream {
        tracing::info!("Starting event stream polling...");
        let mut source = PublicEventSource::new(api);
        let stats = harvester
            .run_stream(&mut source, &BackoffPolicy::default(), &TokioSleeper, running)
            .await;
        tracing::info!(
            "Stream pass: {} polls, {} identities, {} keys stored",
            stats.polls,
            stats.totals.identities,
            stats.totals.keys_stored
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("keyharvest-ingest").chain(argv.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_rejects_no_work_selected() {
        assert!(validate_args(&args(&["--db", "/tmp/keys"])).is_err());
    }

    #[test]
    fn test_rejects_missing_sink() {
        assert!(validate_args(&args(&["--org", "acme"])).is_err());
    }

    #[test]
    fn test_rejects_both_sinks() {
        let parsed = args(&["--org", "acme", "--db", "/tmp/keys", "--out-dir", "/tmp/out"]);
        assert!(validate_args(&parsed).is_err());
    }

    #[test]
    fn test_accepts_org_with_store() {
        assert!(validate_args(&args(&["--org", "acme", "--db", "/tmp/keys"])).is_ok());
    }

    #[test]
    fn test_accepts_stream_with_out_dir() {
        assert!(validate_args(&args(&["--stream", "--out-dir", "/tmp/out"])).is_ok());
    }
}
