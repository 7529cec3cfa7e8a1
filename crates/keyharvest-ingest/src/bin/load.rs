//! Load file-per-identity JSON records into the key store.
//!
//! Replays a directory of `<username>.json` records (written by the
//! daemon's `--out-dir` mode) into a RocksDB key store, then reports the
//! total key count. Per-file errors are logged and skipped.

use anyhow::{Context, Result};
use clap::Parser;
use keyharvest_ingest::{IdentityRecord, KeyStore};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Import harvested JSON records into the key store.
#[derive(Parser, Debug)]
#[command(name = "load")]
#[command(about = "Load per-identity JSON records into the key store")]
#[command(version)]
struct Args {
    /// Directory of <username>.json records
    #[arg(long)]
    dir: PathBuf,

    /// Key store location
    #[arg(long)]
    db: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();

    let store = KeyStore::open(&args.db)?;

    let mut files = 0usize;
    let mut loaded = 0usize;
    let mut keys = 0usize;

    let entries = std::fs::read_dir(&args.dir)
        .with_context(|| format!("Failed to read {}", args.dir.display()))?;

    let mut paths: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    for path in paths {
        files += 1;
        tracing::debug!("Processing {}", path.display());

        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                continue;
            }
        };

        let record: IdentityRecord = match serde_json::from_slice(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", path.display(), e);
                continue;
            }
        };

        let stored_at = record.stored_at;
        match store.store(&record.into_identity(), stored_at) {
            Ok(written) => {
                loaded += 1;
                keys += written;
            }
            Err(e) => tracing::warn!("Failed to store {}: {}", path.display(), e),
        }
    }

    store.flush()?;
    let count = store.count()?;
    tracing::info!(
        "Loaded {}/{} records ({} keys). Total keys in store: {}",
        loaded,
        files,
        keys,
        count
    );

    Ok(())
}
