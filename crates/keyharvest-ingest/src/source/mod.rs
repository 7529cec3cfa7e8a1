//! Identity source adapters.
//!
//! Both upstream enumerations are pulled through the single
//! [`IdentitySource`] contract so the driver treats the exhaustive and the
//! unbounded variant identically, differing only in termination:
//!
//! - [`OrgMemberSource`] walks a fixed membership listing once and signals
//!   completion via `has_more`
//! - [`PublicEventSource`] re-fetches the head of a live event feed on every
//!   call and never signals completion; the driver's outer loop and backoff
//!   policy bound it

mod events;
mod org;

pub use events::PublicEventSource;
pub use org::OrgMemberSource;

use crate::Result;

/// One raw `(username, context)` observation from an upstream source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawIdentity {
    /// Username as assigned by the source.
    pub login: String,

    /// Originating organization or repository name; empty when the source
    /// carried none.
    pub context: String,
}

/// One page of raw identities.
#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    /// Identities in upstream order. May contain repeats; the per-pass
    /// seen-set handles them.
    pub identities: Vec<RawIdentity>,

    /// Whether another call will yield further progress. Always `true` for
    /// head-relative streams.
    pub has_more: bool,
}

/// A source of identities, pulled one page at a time.
#[allow(async_fn_in_trait)]
pub trait IdentitySource {
    /// Human-readable name for this source (used in logs).
    fn name(&self) -> &'static str;

    /// Fetch the next page. Callable repeatedly; a returned error leaves
    /// the source in a state where the call may be retried.
    async fn next_page(&mut self) -> Result<SourcePage>;
}
