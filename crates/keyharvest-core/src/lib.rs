//! Core types shared across keyharvest components.
//!
//! This crate holds the data model for harvested identities and the
//! provenance metadata attached to every stored public key, plus the
//! Prometheus metrics plumbing used by the ingestion daemon.
//!
//! # Modules
//!
//! - [`identity`] - `Identity` and `KeyMetadata` types, bot-account heuristic
//! - [`metrics`] - Prometheus recorder setup and the `/metrics` endpoint

pub mod identity;
pub mod metrics;

pub use identity::{Identity, KeyMetadata, is_probable_bot};
