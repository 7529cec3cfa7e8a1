//! Persistence sinks and the resumption contract.
//!
//! The driver writes through [`KeySink`] and consults [`ResumeCheck`] before
//! fetching keys, so the store-backed and file-per-identity deployments
//! satisfy one interface. [`JsonDirSink`] is the file-backed fallback: one
//! pretty-printed JSON record per identity, resumption by file existence.

use crate::error::Result;
use chrono::{DateTime, Utc};
use keyharvest_core::Identity;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Destination for harvested identities.
pub trait KeySink {
    /// Persist all public keys of `identity` with the given effective
    /// timestamp. Returns the number of key entries written.
    fn record(&self, identity: &Identity, timestamp: DateTime<Utc>) -> Result<usize>;
}

/// Cross-run resumption probe, orthogonal to per-pass dedup.
pub trait ResumeCheck {
    /// Whether `username` was already recorded by a previous run or pass.
    fn already_recorded(&self, username: &str) -> Result<bool>;
}

impl<T: KeySink> KeySink for &T {
    fn record(&self, identity: &Identity, timestamp: DateTime<Utc>) -> Result<usize> {
        (**self).record(identity, timestamp)
    }
}

impl<T: ResumeCheck> ResumeCheck for &T {
    fn already_recorded(&self, username: &str) -> Result<bool> {
        (**self).already_recorded(username)
    }
}

/// On-disk record written by the file sink and replayed by the `load`
/// utility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Username the record belongs to.
    pub username: String,

    /// Organization or repository the identity was observed in.
    pub context: String,

    /// Public key material, one line per key.
    pub public_keys: Vec<String>,

    /// When the record was written.
    pub stored_at: DateTime<Utc>,
}

impl IdentityRecord {
    /// Rebuild the identity value carried by this record.
    pub fn into_identity(self) -> Identity {
        Identity {
            username: self.username,
            context: self.context,
            public_keys: self.public_keys,
        }
    }
}

/// File-per-identity sink: `<dir>/<username>.json`.
pub struct JsonDirSink {
    dir: PathBuf,
}

impl JsonDirSink {
    /// Create the sink, creating the output directory if needed.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, username: &str) -> PathBuf {
        self.dir.join(format!("{username}.json"))
    }
}

impl KeySink for JsonDirSink {
    fn record(&self, identity: &Identity, timestamp: DateTime<Utc>) -> Result<usize> {
        let record = IdentityRecord {
            username: identity.username.clone(),
            context: identity.context.clone(),
            public_keys: identity.public_keys.clone(),
            stored_at: timestamp,
        };
        let json = serde_json::to_vec_pretty(&record)?;
        fs::write(self.path_for(&identity.username), json)?;
        Ok(identity.public_keys.iter().filter(|k| !k.is_empty()).count())
    }
}

impl ResumeCheck for JsonDirSink {
    fn already_recorded(&self, username: &str) -> Result<bool> {
        Ok(self.path_for(username).exists())
    }
}
