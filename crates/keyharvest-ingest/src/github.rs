//! Upstream identity-listing API client.
//!
//! The sources consume the upstream through the [`IdentityApi`] trait: a
//! paginated organization-member enumeration and a head-relative public
//! events feed. [`GithubClient`] is the production implementation against
//! the GitHub REST API; tests substitute in-memory fakes.
//!
//! Rate limiting is surfaced as the distinguished [`Error::RateLimited`] so
//! the driver can apply its long cooldown instead of the short transient
//! retry.

use crate::{Error, Result};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LINK, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;

/// One page of an organization member listing.
#[derive(Debug, Clone, Default)]
pub struct MemberPage {
    /// Member login names, in upstream order.
    pub logins: Vec<String>,

    /// Page number to request next, or `None` when the walk is complete.
    pub next_page: Option<u32>,
}

/// One event from the public activity feed, reduced to what the pipeline
/// needs: who acted and where.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    /// Actor login, if the event carried an identifiable actor.
    pub actor_login: Option<String>,

    /// Originating repository name (`owner/repo`), if present.
    pub repo_name: Option<String>,
}

/// Upstream identity-listing collaborator.
#[allow(async_fn_in_trait)]
pub trait IdentityApi {
    /// Fetch one page of an organization's member listing. Pages are
    /// 1-based.
    async fn org_members_page(&self, org: &str, page: u32) -> Result<MemberPage>;

    /// Fetch the current head page of the public events feed.
    async fn recent_events(&self) -> Result<Vec<StreamEvent>>;
}

/// Configuration for the GitHub API client.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// REST API base URL (e.g. `https://api.github.com`).
    pub api_base: String,

    /// Bearer token for authenticated requests.
    pub token: String,

    /// Page size for listing endpoints.
    pub per_page: u32,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            token: String::new(),
            per_page: 100,
            timeout: Duration::from_secs(30),
        }
    }
}

/// GitHub REST implementation of [`IdentityApi`].
#[derive(Clone)]
pub struct GithubClient {
    client: reqwest::Client,
    config: GithubConfig,
}

impl GithubClient {
    /// Create a new client with the given configuration.
    pub fn new(config: GithubConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("keyharvest/", env!("CARGO_PKG_VERSION"))),
        );
        if !config.token.is_empty() {
            let value = format!("Bearer {}", config.token);
            let mut value = HeaderValue::from_str(&value)
                .map_err(|e| Error::Config(format!("invalid token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }
}

impl IdentityApi for GithubClient {
    async fn org_members_page(&self, org: &str, page: u32) -> Result<MemberPage> {
        let url = format!("{}/orgs/{}/members", self.config.api_base, org);
        let resp = self
            .client
            .get(&url)
            .query(&[("per_page", self.config.per_page), ("page", page)])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(classify_failure(
                resp.status(),
                resp.headers(),
                &format!("member listing for {org}"),
            ));
        }

        let has_next = resp
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .is_some_and(link_has_next);

        let members: Vec<Member> = resp.json().await?;

        Ok(MemberPage {
            logins: members.into_iter().map(|m| m.login).collect(),
            next_page: has_next.then_some(page + 1),
        })
    }

    async fn recent_events(&self) -> Result<Vec<StreamEvent>> {
        let url = format!("{}/events", self.config.api_base);
        let resp = self
            .client
            .get(&url)
            .query(&[("per_page", self.config.per_page)])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(classify_failure(
                resp.status(),
                resp.headers(),
                "event listing",
            ));
        }

        let events: Vec<RawEvent> = resp.json().await?;

        Ok(events
            .into_iter()
            .map(|e| StreamEvent {
                actor_login: e.actor.and_then(|a| a.login),
                repo_name: e.repo.and_then(|r| r.name),
            })
            .collect())
    }
}

/// Classify a non-success response, distinguishing rate limiting.
fn classify_failure(status: StatusCode, headers: &HeaderMap, what: &str) -> Error {
    if is_rate_limited(status, headers) {
        return Error::RateLimited;
    }
    Error::Source(format!("{what} failed: HTTP {status}"))
}

/// Whether a response indicates upstream throttling.
///
/// GitHub signals primary rate limiting with 403 plus an exhausted
/// `x-ratelimit-remaining` header, and secondary limits with 429.
fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    status == StatusCode::FORBIDDEN
        && headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "0")
}

/// Whether a `Link` header advertises a further page.
fn link_has_next(link: &str) -> bool {
    link.split(',').any(|part| part.contains("rel=\"next\""))
}

#[derive(Debug, Deserialize)]
struct Member {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    actor: Option<ActorRef>,
    repo: Option<RepoRef>,
}

#[derive(Debug, Deserialize)]
struct ActorRef {
    login: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepoRef {
    name: Option<String>,
}
