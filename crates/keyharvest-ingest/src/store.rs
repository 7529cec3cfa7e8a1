//! Durable key-addressed store using RocksDB.
//!
//! Maps public key bytes (verbatim) to a serialized [`KeyMetadata`] record.
//! Writing the same key again replaces the prior record: last-write-wins,
//! no merge, no history.
//!
//! # Column families
//!
//! - `keys`: public key line → JSON `{user, repo, timestamp}`
//! - `users`: username → RFC 3339 timestamp of the last completed store
//!   call, consulted by the resumption check so repeated runs stay
//!   incremental
//!
//! Keeping usernames in their own column family means [`KeyStore::count`]
//! scans public-key entries only.

use crate::error::Result;
use crate::sink::{KeySink, ResumeCheck};
use chrono::{DateTime, Utc};
use keyharvest_core::{Identity, KeyMetadata};
use rocksdb::{DBWithThreadMode, IteratorMode, MultiThreaded, Options};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const KEYS_CF: &str = "keys";
const USERS_CF: &str = "users";

/// RocksDB-backed store for harvested public keys.
///
/// Thread-safe: can be shared across threads via `Arc<KeyStore>`. RocksDB
/// serializes concurrent writers internally, so last-write-wins ordering is
/// applied deterministically per key.
pub struct KeyStore {
    db: DBWithThreadMode<MultiThreaded>,
}

impl KeyStore {
    /// Open or create a key store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening key store at {}", path.display());

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        // Write-heavy workload
        opts.set_write_buffer_size(64 * 1024 * 1024);
        opts.set_max_write_buffer_number(3);
        opts.set_target_file_size_base(64 * 1024 * 1024);

        // Bloom filters for fast "not found" lookups
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_cache_index_and_filter_blocks(true);
        opts.set_block_based_table_factory(&block_opts);

        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        opts.increase_parallelism(num_cpus::get() as i32);
        opts.set_max_background_jobs(4);

        let db = DBWithThreadMode::<MultiThreaded>::open_cf(&opts, path, [KEYS_CF, USERS_CF])?;

        Ok(Self { db })
    }

    fn cf(&self, name: &str) -> Arc<rocksdb::BoundColumnFamily<'_>> {
        // Both column families are created at open
        self.db
            .cf_handle(name)
            .expect("column family registered at open")
    }

    /// Write all public keys of an identity, each under its own entry.
    ///
    /// Every key maps to the same metadata record (username, context,
    /// `timestamp`). Empty key strings contribute no entries. Writes are
    /// independent: if one fails, keys already written in this call remain
    /// written and the error is surfaced. On success the username is marked
    /// for the resumption check and the number of key entries written is
    /// returned.
    pub fn store(&self, identity: &Identity, timestamp: DateTime<Utc>) -> Result<usize> {
        let metadata = KeyMetadata {
            user: identity.username.clone(),
            repo: identity.context.clone(),
            timestamp,
        };
        let value = serde_json::to_vec(&metadata)?;

        let keys_cf = self.cf(KEYS_CF);
        let mut written = 0usize;
        for key in &identity.public_keys {
            if key.is_empty() {
                continue;
            }
            self.db.put_cf(&keys_cf, key.as_bytes(), &value)?;
            written += 1;
        }

        // Marked last so a failed write above leaves the identity
        // unrecorded and a later run retries it
        self.db.put_cf(
            &self.cf(USERS_CF),
            identity.username.as_bytes(),
            timestamp.to_rfc3339().as_bytes(),
        )?;

        debug!(
            "stored {} key(s) for {} from {:?}",
            written, identity.username, identity.context
        );
        Ok(written)
    }

    /// Look up the metadata recorded for a public key.
    pub fn lookup(&self, public_key: &str) -> Result<Option<KeyMetadata>> {
        match self.db.get_cf(&self.cf(KEYS_CF), public_key.as_bytes())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Whether an identity has already been recorded by a completed
    /// `store` call.
    pub fn has_user(&self, username: &str) -> Result<bool> {
        Ok(self
            .db
            .get_cf(&self.cf(USERS_CF), username.as_bytes())?
            .is_some())
    }

    /// Number of distinct public-key entries, by full scan.
    ///
    /// Reporting only; not on any hot path.
    pub fn count(&self) -> Result<usize> {
        let keys_cf = self.cf(KEYS_CF);
        let mut count = 0usize;
        for item in self.db.iterator_cf(&keys_cf, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Approximate number of public-key entries, from RocksDB properties.
    pub fn stats(&self) -> StoreStats {
        let approximate_keys = self
            .db
            .property_int_value_cf(&self.cf(KEYS_CF), "rocksdb.estimate-num-keys")
            .ok()
            .flatten()
            .unwrap_or(0);
        StoreStats { approximate_keys }
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush_cf(&self.cf(KEYS_CF))?;
        self.db.flush_cf(&self.cf(USERS_CF))?;
        Ok(())
    }
}

impl KeySink for KeyStore {
    fn record(&self, identity: &Identity, timestamp: DateTime<Utc>) -> Result<usize> {
        self.store(identity, timestamp)
    }
}

impl ResumeCheck for KeyStore {
    fn already_recorded(&self, username: &str) -> Result<bool> {
        self.has_user(username)
    }
}

/// Statistics about the key store.
#[derive(Debug, Clone)]
pub struct StoreStats {
    /// Approximate number of public-key entries.
    pub approximate_keys: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn identity(user: &str, repo: &str, keys: &[&str]) -> Identity {
        Identity::new(user, repo, keys.iter().map(|k| k.to_string()).collect())
    }

    #[test]
    fn test_open_and_close() {
        let tmp = TempDir::new().unwrap();
        let _store = KeyStore::open(tmp.path()).unwrap();
    }

    #[test]
    fn test_store_and_lookup() {
        let tmp = TempDir::new().unwrap();
        let store = KeyStore::open(tmp.path()).unwrap();

        let ts = Utc::now();
        let written = store
            .store(&identity("alice", "acme", &["ssh-ed25519 AAAA"]), ts)
            .unwrap();
        assert_eq!(written, 1);

        let meta = store.lookup("ssh-ed25519 AAAA").unwrap().unwrap();
        assert_eq!(meta.user, "alice");
        assert_eq!(meta.repo, "acme");
        assert_eq!(meta.timestamp, ts);
    }

    #[test]
    fn test_lookup_missing_key() {
        let tmp = TempDir::new().unwrap();
        let store = KeyStore::open(tmp.path()).unwrap();
        assert!(store.lookup("ssh-rsa UNKNOWN").unwrap().is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let tmp = TempDir::new().unwrap();
        let store = KeyStore::open(tmp.path()).unwrap();

        let key = "ssh-ed25519 SHARED";
        store
            .store(&identity("alice", "acme", &[key]), Utc::now())
            .unwrap();
        store
            .store(&identity("bob", "widget-co", &[key]), Utc::now())
            .unwrap();

        let meta = store.lookup(key).unwrap().unwrap();
        assert_eq!(meta.user, "bob");
        assert_eq!(meta.repo, "widget-co");
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_empty_keys_store_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = KeyStore::open(tmp.path()).unwrap();

        let written = store.store(&identity("alice", "acme", &[]), Utc::now()).unwrap();
        assert_eq!(written, 0);
        assert_eq!(store.count().unwrap(), 0);

        // Empty key strings are skipped too
        let written = store
            .store(&identity("bob", "acme", &["", "ssh-rsa BBBB"]), Utc::now())
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.lookup("").unwrap().is_none());
    }

    #[test]
    fn test_count_sums_disjoint_key_sets_and_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = KeyStore::open(tmp.path()).unwrap();

        let alice = identity("alice", "acme", &["k1", "k2"]);
        let bob = identity("bob", "acme", &["k3", "k4", "k5"]);
        store.store(&alice, Utc::now()).unwrap();
        store.store(&bob, Utc::now()).unwrap();
        assert_eq!(store.count().unwrap(), 5);

        // Re-storing the same identities leaves the count unchanged
        store.store(&alice, Utc::now()).unwrap();
        store.store(&bob, Utc::now()).unwrap();
        assert_eq!(store.count().unwrap(), 5);
    }

    #[test]
    fn test_has_user_marked_after_store() {
        let tmp = TempDir::new().unwrap();
        let store = KeyStore::open(tmp.path()).unwrap();

        assert!(!store.has_user("alice").unwrap());
        store
            .store(&identity("alice", "acme", &["k1"]), Utc::now())
            .unwrap();
        assert!(store.has_user("alice").unwrap());

        // Zero-key identities are still marked as recorded
        store.store(&identity("carol", "acme", &[]), Utc::now()).unwrap();
        assert!(store.has_user("carol").unwrap());
    }

    #[test]
    fn test_user_marker_does_not_pollute_count() {
        let tmp = TempDir::new().unwrap();
        let store = KeyStore::open(tmp.path()).unwrap();

        store
            .store(&identity("alice", "acme", &["k1"]), Utc::now())
            .unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_reopen_persists() {
        let tmp = TempDir::new().unwrap();
        {
            let store = KeyStore::open(tmp.path()).unwrap();
            store
                .store(&identity("alice", "acme", &["k1"]), Utc::now())
                .unwrap();
            store.flush().unwrap();
        }
        let store = KeyStore::open(tmp.path()).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.has_user("alice").unwrap());
    }
}
