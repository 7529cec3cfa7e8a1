//! Ingestion driver.
//!
//! Orchestrates the per-identity pipeline (bot filter, per-pass dedup,
//! resumption check, key fetch, sink write) and owns the retry/backoff
//! policy for the unbounded stream pass.
//!
//! # Pass shapes
//!
//! - [`Harvester::run_membership_pass`] walks a finite source to completion
//!   under one seen-set; a source error is fatal for that pass and surfaces
//!   to the caller.
//! - [`Harvester::run_stream`] loops [`Harvester::poll_once`] until the
//!   shutdown flag clears, constructing a fresh seen-set per poll (the feed
//!   is head-relative) and sleeping between polls: a long cooldown after a
//!   rate limit, a short retry after other source errors, and a short rest
//!   after every successful poll to bound the request rate.
//!
//! Per-identity failures never abort a pass: key-fetch failures are already
//! empty key sets, and sink write errors are logged, counted, and skipped.

use crate::dedupe::SeenSet;
use crate::error::{Error, Result};
use crate::fetch::KeyFetch;
use crate::sink::{KeySink, ResumeCheck};
use crate::source::{IdentitySource, RawIdentity};
use chrono::Utc;
use keyharvest_core::{Identity, is_probable_bot};
use metrics::counter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

/// Wait durations for the stream loop, decided by error kind.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Cooldown after upstream rate limiting.
    pub rate_limit_cooldown: Duration,

    /// Retry delay after a generic source error.
    pub transient_retry: Duration,

    /// Rest between successful poll cycles.
    pub poll_rest: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            rate_limit_cooldown: Duration::from_secs(20 * 60),
            transient_retry: Duration::from_secs(5),
            poll_rest: Duration::from_secs(1),
        }
    }
}

impl BackoffPolicy {
    /// The wait to apply after a failed poll.
    pub fn delay_for(&self, err: &Error) -> Duration {
        if err.is_rate_limit() {
            self.rate_limit_cooldown
        } else {
            self.transient_retry
        }
    }
}

/// Sleep abstraction so backoff behavior is testable without real delays.
#[allow(async_fn_in_trait)]
pub trait Sleeper {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Counters for one enumeration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Identities yielded by the source, before any filtering.
    pub identities: usize,

    /// Identities that reached the key-fetch step.
    pub processed: usize,

    /// Skipped: same-pass duplicate (or empty username).
    pub duplicates: usize,

    /// Skipped: recorded by a previous run or pass.
    pub already_recorded: usize,

    /// Skipped: bot-suffix heuristic.
    pub bots: usize,

    /// Public key entries written to the sink.
    pub keys_stored: usize,

    /// Sink write failures (logged, pass continued).
    pub store_errors: usize,
}

impl PassStats {
    fn absorb(&mut self, other: &PassStats) {
        self.identities += other.identities;
        self.processed += other.processed;
        self.duplicates += other.duplicates;
        self.already_recorded += other.already_recorded;
        self.bots += other.bots;
        self.keys_stored += other.keys_stored;
        self.store_errors += other.store_errors;
    }
}

/// Counters for a stream run (many poll cycles).
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    /// Completed poll cycles.
    pub polls: usize,

    /// Rate-limit excursions.
    pub rate_limit_hits: usize,

    /// Generic source-error excursions.
    pub transient_errors: usize,

    /// Totals across all polls.
    pub totals: PassStats,
}

/// The ingestion driver: fetcher plus sink, applied to identity sources.
pub struct Harvester<F, K> {
    fetcher: F,
    sink: K,
}

impl<F, K> Harvester<F, K>
where
    F: KeyFetch,
    K: KeySink + ResumeCheck,
{
    /// Create a driver writing through `sink`.
    pub fn new(fetcher: F, sink: K) -> Self {
        Self { fetcher, sink }
    }

    /// Run one identity through the pipeline.
    async fn process_one(&self, raw: &RawIdentity, seen: &mut SeenSet, stats: &mut PassStats) {
        stats.identities += 1;
        counter!("harvest_identities_total").increment(1);

        if is_probable_bot(&raw.login) {
            stats.bots += 1;
            counter!("harvest_identities_skipped_total", "reason" => "bot").increment(1);
            return;
        }

        if !seen.should_process(&raw.login) {
            stats.duplicates += 1;
            counter!("harvest_identities_skipped_total", "reason" => "duplicate").increment(1);
            return;
        }

        match self.sink.already_recorded(&raw.login) {
            Ok(true) => {
                stats.already_recorded += 1;
                counter!("harvest_identities_skipped_total", "reason" => "recorded").increment(1);
                return;
            }
            Ok(false) => {}
            Err(e) => {
                // Re-storing is idempotent, so degrade to "not recorded"
                warn!("resumption check for {} failed: {}", raw.login, e);
            }
        }

        stats.processed += 1;
        counter!("harvest_identities_processed_total").increment(1);

        let keys = self.fetcher.fetch(&raw.login).await;
        let identity = Identity::new(raw.login.clone(), raw.context.clone(), keys);

        info!(
            "storing {} from {:?} ({} keys)",
            identity.username,
            identity.context,
            identity.public_keys.len()
        );

        match self.sink.record(&identity, Utc::now()) {
            Ok(written) => {
                stats.keys_stored += written;
                counter!("harvest_keys_stored_total").increment(written as u64);
            }
            Err(e) => {
                stats.store_errors += 1;
                counter!("harvest_store_errors_total").increment(1);
                warn!("failed to store {}: {}", identity.username, e);
            }
        }
    }

    /// Walk a finite membership source to completion.
    ///
    /// One seen-set covers the whole walk. A source error aborts the pass
    /// and surfaces to the caller.
    pub async fn run_membership_pass<S: IdentitySource>(&self, source: &mut S) -> Result<PassStats> {
        let mut seen = SeenSet::new();
        let mut stats = PassStats::default();

        loop {
            let page = source.next_page().await?;
            for raw in &page.identities {
                self.process_one(raw, &mut seen, &mut stats).await;
            }
            if !page.has_more {
                break;
            }
        }

        info!(
            "{} pass complete: {} identities, {} processed, {} keys stored",
            source.name(),
            stats.identities,
            stats.processed,
            stats.keys_stored
        );
        Ok(stats)
    }

    /// Run one poll cycle of an unbounded source, with a fresh seen-set.
    pub async fn poll_once<S: IdentitySource>(&self, source: &mut S) -> Result<PassStats> {
        let mut seen = SeenSet::new();
        let mut stats = PassStats::default();

        let page = source.next_page().await?;
        for raw in &page.identities {
            self.process_one(raw, &mut seen, &mut stats).await;
        }

        Ok(stats)
    }

    /// Poll an unbounded source until the shutdown flag clears.
    ///
    /// Self-heals through backoff: rate limits sleep the long cooldown,
    /// other source errors the short retry, and successful polls the
    /// inter-poll rest.
    pub async fn run_stream<S, SL>(
        &self,
        source: &mut S,
        backoff: &BackoffPolicy,
        sleeper: &SL,
        running: &AtomicBool,
    ) -> StreamStats
    where
        S: IdentitySource,
        SL: Sleeper,
    {
        let mut stream = StreamStats::default();

        while running.load(Ordering::SeqCst) {
            match self.poll_once(source).await {
                Ok(stats) => {
                    stream.polls += 1;
                    stream.totals.absorb(&stats);
                    counter!("harvest_polls_total").increment(1);
                    info!(
                        "poll {}: {} identities, {} processed, {} keys stored",
                        stream.polls, stats.identities, stats.processed, stats.keys_stored
                    );
                    sleeper.sleep(backoff.poll_rest).await;
                }
                Err(e) => {
                    if e.is_rate_limit() {
                        stream.rate_limit_hits += 1;
                        counter!("harvest_rate_limit_total").increment(1);
                        warn!(
                            "rate limit hit, cooling down for {:?}",
                            backoff.rate_limit_cooldown
                        );
                    } else {
                        stream.transient_errors += 1;
                        counter!("harvest_source_errors_total").increment(1);
                        warn!("poll failed: {}, retrying in {:?}", e, backoff.transient_retry);
                    }
                    sleeper.sleep(backoff.delay_for(&e)).await;
                }
            }
        }

        info!(
            "stream stopped after {} polls: {} keys stored, {} rate limits, {} transient errors",
            stream.polls, stream.totals.keys_stored, stream.rate_limit_hits, stream.transient_errors
        );
        stream
    }
}
