//! Public-key harvesting pipeline.
//!
//! This crate ingests identities from upstream sources and persists every
//! discovered public key into a durable, key-addressed store.
//!
//! # Modules
//!
//! - [`source`] - Identity source adapters (org membership, public events)
//! - [`github`] - Upstream API collaborator
//! - [`fetch`] - Per-user public key retrieval
//! - [`dedupe`] - Per-pass username deduplication
//! - [`store`] - RocksDB-backed durable key store
//! - [`sink`] - Sink/resumption contracts and the file-per-identity fallback
//! - [`driver`] - Ingestion driver with retry/backoff
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ IdentitySource   │  (org member listing, public events feed)
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │ SeenSet / Resume │  per-pass dedup + cross-run resumption
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │    KeyFetch      │  per-user key listing, failure → zero keys
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │    KeySink       │  RocksDB key store (or JSON file per identity)
//! └──────────────────┘
//! ```
//!
//! The store is last-write-wins: re-storing a public key replaces its
//! provenance record.

pub mod dedupe;
pub mod driver;
pub mod error;
pub mod fetch;
pub mod github;
pub mod sink;
pub mod source;
pub mod store;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

pub use dedupe::SeenSet;
pub use driver::{BackoffPolicy, Harvester, PassStats, Sleeper, StreamStats, TokioSleeper};
pub use fetch::{GithubKeyFetcher, KeyFetch};
pub use github::{GithubClient, GithubConfig, IdentityApi, MemberPage, StreamEvent};
pub use sink::{IdentityRecord, JsonDirSink, KeySink, ResumeCheck};
pub use source::{IdentitySource, OrgMemberSource, PublicEventSource, RawIdentity, SourcePage};
pub use store::{KeyStore, StoreStats};
