//! Per-user public key retrieval.
//!
//! Key absence is a normal outcome, not an error: transport failures,
//! non-success statuses, and empty bodies all yield an empty key set so the
//! pipeline never aborts over one identity's keys.

use std::time::Duration;

/// Retrieves the public key material published for a username.
#[allow(async_fn_in_trait)]
pub trait KeyFetch {
    /// Fetch the keys for `username`. Infallible: failures yield an empty
    /// vector. Repeated calls may legitimately return different results if
    /// the user rotates keys; the latest fetch is taken as current truth.
    async fn fetch(&self, username: &str) -> Vec<String>;
}

/// Fetches keys from the `https://github.com/<user>.keys` endpoint.
///
/// The keys endpoint is public and unauthenticated, so this carries its own
/// HTTP client rather than sharing the API client's credentials.
pub struct GithubKeyFetcher {
    client: reqwest::Client,
    base: String,
}

impl GithubKeyFetcher {
    /// Create a fetcher against the given base URL (e.g.
    /// `https://github.com`).
    pub fn new(base: impl Into<String>) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
        })
    }
}

impl KeyFetch for GithubKeyFetcher {
    async fn fetch(&self, username: &str) -> Vec<String> {
        let url = format!("{}/{}.keys", self.base, username);
        tracing::debug!("fetching public keys for {}", username);

        let resp = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!("key fetch for {} failed: {}", username, e);
                return Vec::new();
            }
        };

        if !resp.status().is_success() {
            tracing::debug!("key fetch for {}: HTTP {}", username, resp.status());
            return Vec::new();
        }

        match resp.text().await {
            Ok(body) => parse_key_listing(&body),
            Err(e) => {
                tracing::debug!("key fetch for {}: body read failed: {}", username, e);
                Vec::new()
            }
        }
    }
}

/// Split a key-listing response body into key lines.
///
/// Trailing whitespace is trimmed first so the conventional trailing newline
/// never produces an empty final element. Order is preserved.
pub fn parse_key_listing(body: &str) -> Vec<String> {
    let trimmed = body.trim_end();
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.lines().map(str::to_string).collect()
}
