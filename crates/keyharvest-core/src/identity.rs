//! Identity and key-provenance types.
//!
//! An [`Identity`] is one discovered username together with the public keys
//! fetched for it and the context (organization or repository name) it was
//! observed in. Identities are immutable values: re-processing a username
//! produces a new `Identity`, never a mutation of a prior one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A discovered identity: username, originating context, and fetched keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Source-assigned username, case-preserving, never empty.
    pub username: String,

    /// Originating organization or repository name. May be empty for
    /// events that carry no repository.
    pub context: String,

    /// Public key material, one opaque line per key, in upstream order.
    /// May be empty for users with no published keys.
    pub public_keys: Vec<String>,
}

impl Identity {
    /// Create a new identity value.
    pub fn new(
        username: impl Into<String>,
        context: impl Into<String>,
        public_keys: Vec<String>,
    ) -> Self {
        Self {
            username: username.into(),
            context: context.into(),
            public_keys,
        }
    }
}

/// Provenance metadata stored against every public key.
///
/// All keys belonging to one identity share an identical record at write
/// time; each key is stored under its own entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMetadata {
    /// Username the key was fetched for.
    pub user: String,

    /// Organization or repository the identity was observed in.
    pub repo: String,

    /// When the key was stored.
    pub timestamp: DateTime<Utc>,
}

/// Best-effort textual heuristic for bot accounts.
///
/// Matches the upstream convention of bot logins ending in `bot` (e.g.
/// `dependabot`) or `bot]` (e.g. `github-actions[bot]`). Not authoritative:
/// the goal is only to avoid wasting key-fetch calls on obvious non-human
/// accounts.
pub fn is_probable_bot(login: &str) -> bool {
    login.ends_with("bot") || login.ends_with("bot]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_new() {
        let id = Identity::new("alice", "acme", vec!["ssh-ed25519 AAAA".to_string()]);
        assert_eq!(id.username, "alice");
        assert_eq!(id.context, "acme");
        assert_eq!(id.public_keys.len(), 1);
    }

    #[test]
    fn test_metadata_json_field_names() {
        let meta = KeyMetadata {
            user: "alice".to_string(),
            repo: "acme/widget".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"user\":\"alice\""));
        assert!(json.contains("\"repo\":\"acme/widget\""));
        assert!(json.contains("\"timestamp\""));
    }

    #[test]
    fn test_metadata_roundtrip() {
        let meta = KeyMetadata {
            user: "bob".to_string(),
            repo: "".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_vec(&meta).unwrap();
        let back: KeyMetadata = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_bot_suffix_detection() {
        assert!(is_probable_bot("dependabot"));
        assert!(is_probable_bot("renovate-bot"));
        assert!(is_probable_bot("github-actions[bot]"));
        assert!(!is_probable_bot("alice"));
        assert!(!is_probable_bot("botanist"));
        assert!(!is_probable_bot(""));
    }
}
