//! Public activity stream source.

use super::{IdentitySource, RawIdentity, SourcePage};
use crate::Result;
use crate::github::IdentityApi;

/// Polls the head of the public events feed.
///
/// The feed is head-relative: there is no stable pagination cursor across
/// polls, so every [`next_page`](IdentitySource::next_page) call re-fetches
/// the current most-recent window and the caller applies a fresh per-poll
/// seen-set. Events without an identifiable actor are skipped. The source
/// never signals completion.
pub struct PublicEventSource<A: IdentityApi> {
    api: A,
}

impl<A: IdentityApi> PublicEventSource<A> {
    /// Create a source over the public events feed.
    pub fn new(api: A) -> Self {
        Self { api }
    }
}

impl<A: IdentityApi> IdentitySource for PublicEventSource<A> {
    fn name(&self) -> &'static str {
        "public-events"
    }

    async fn next_page(&mut self) -> Result<SourcePage> {
        let events = self.api.recent_events().await?;

        let identities = events
            .into_iter()
            .filter_map(|event| {
                event.actor_login.map(|login| RawIdentity {
                    login,
                    context: event.repo_name.unwrap_or_default(),
                })
            })
            .collect();

        Ok(SourcePage {
            identities,
            has_more: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::github::{MemberPage, StreamEvent};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    struct FakeApi {
        polls: RefCell<VecDeque<Result<Vec<StreamEvent>>>>,
    }

    impl FakeApi {
        fn new(polls: Vec<Result<Vec<StreamEvent>>>) -> Self {
            Self {
                polls: RefCell::new(polls.into()),
            }
        }
    }

    impl IdentityApi for FakeApi {
        async fn org_members_page(&self, _org: &str, _page: u32) -> Result<MemberPage> {
            unimplemented!("event tests never list members")
        }

        async fn recent_events(&self) -> Result<Vec<StreamEvent>> {
            self.polls
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn event(actor: Option<&str>, repo: Option<&str>) -> StreamEvent {
        StreamEvent {
            actor_login: actor.map(str::to_string),
            repo_name: repo.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_extracts_actor_and_repo() {
        let api = FakeApi::new(vec![Ok(vec![
            event(Some("alice"), Some("acme/widget")),
            event(Some("bob"), None),
        ])]);
        let mut source = PublicEventSource::new(api);

        let page = source.next_page().await.unwrap();
        assert_eq!(page.identities.len(), 2);
        assert_eq!(page.identities[0].login, "alice");
        assert_eq!(page.identities[0].context, "acme/widget");
        assert_eq!(page.identities[1].context, "");
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn test_skips_events_without_actor() {
        let api = FakeApi::new(vec![Ok(vec![
            event(None, Some("acme/widget")),
            event(Some("alice"), Some("acme/widget")),
        ])]);
        let mut source = PublicEventSource::new(api);

        let page = source.next_page().await.unwrap();
        assert_eq!(page.identities.len(), 1);
        assert_eq!(page.identities[0].login, "alice");
    }

    #[tokio::test]
    async fn test_rate_limit_propagates() {
        let api = FakeApi::new(vec![Err(Error::RateLimited)]);
        let mut source = PublicEventSource::new(api);

        let err = source.next_page().await.unwrap_err();
        assert!(err.is_rate_limit());
    }

    #[tokio::test]
    async fn test_never_signals_completion() {
        let api = FakeApi::new(vec![Ok(Vec::new())]);
        let mut source = PublicEventSource::new(api);

        let page = source.next_page().await.unwrap();
        assert!(page.identities.is_empty());
        assert!(page.has_more);
    }
}
