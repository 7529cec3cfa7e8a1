//! Organization membership source.

use super::{IdentitySource, RawIdentity, SourcePage};
use crate::Result;
use crate::github::IdentityApi;

/// Exhaustively paginates an organization's member listing, one upstream
/// page per [`next_page`](IdentitySource::next_page) call.
///
/// Deterministic and finite: the walk terminates when the upstream reports
/// no further page. Every member is yielded with the organization name as
/// context.
pub struct OrgMemberSource<A: IdentityApi> {
    api: A,
    org: String,
    page: u32,
    done: bool,
}

impl<A: IdentityApi> OrgMemberSource<A> {
    /// Create a source over the members of `org`.
    pub fn new(api: A, org: impl Into<String>) -> Self {
        Self {
            api,
            org: org.into(),
            page: 1,
            done: false,
        }
    }

    /// The organization being enumerated.
    pub fn org(&self) -> &str {
        &self.org
    }
}

impl<A: IdentityApi> IdentitySource for OrgMemberSource<A> {
    fn name(&self) -> &'static str {
        "org-members"
    }

    async fn next_page(&mut self) -> Result<SourcePage> {
        if self.done {
            return Ok(SourcePage::default());
        }

        let page = self.api.org_members_page(&self.org, self.page).await?;

        match page.next_page {
            Some(next) => self.page = next,
            None => self.done = true,
        }

        Ok(SourcePage {
            identities: page
                .logins
                .into_iter()
                .map(|login| RawIdentity {
                    login,
                    context: self.org.clone(),
                })
                .collect(),
            has_more: !self.done,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{MemberPage, StreamEvent};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    struct FakeApi {
        pages: RefCell<VecDeque<MemberPage>>,
    }

    impl FakeApi {
        fn new(pages: Vec<MemberPage>) -> Self {
            Self {
                pages: RefCell::new(pages.into()),
            }
        }
    }

    impl IdentityApi for FakeApi {
        async fn org_members_page(&self, _org: &str, _page: u32) -> Result<MemberPage> {
            Ok(self.pages.borrow_mut().pop_front().unwrap_or_default())
        }

        async fn recent_events(&self) -> Result<Vec<StreamEvent>> {
            unimplemented!("membership tests never poll events")
        }
    }

    fn page(logins: &[&str], next_page: Option<u32>) -> MemberPage {
        MemberPage {
            logins: logins.iter().map(|l| l.to_string()).collect(),
            next_page,
        }
    }

    #[tokio::test]
    async fn test_two_page_walk_terminates() {
        let api = FakeApi::new(vec![
            page(&["alice", "bob"], Some(2)),
            page(&["carol"], None),
        ]);
        let mut source = OrgMemberSource::new(api, "acme");

        let first = source.next_page().await.unwrap();
        assert_eq!(first.identities.len(), 2);
        assert!(first.has_more);
        assert_eq!(first.identities[0].login, "alice");
        assert_eq!(first.identities[0].context, "acme");

        let second = source.next_page().await.unwrap();
        assert_eq!(second.identities.len(), 1);
        assert!(!second.has_more);

        // Calls past the end yield nothing
        let done = source.next_page().await.unwrap();
        assert!(done.identities.is_empty());
        assert!(!done.has_more);
    }

    #[tokio::test]
    async fn test_single_page_walk() {
        let api = FakeApi::new(vec![page(&["alice"], None)]);
        let mut source = OrgMemberSource::new(api, "acme");

        let only = source.next_page().await.unwrap();
        assert_eq!(only.identities.len(), 1);
        assert!(!only.has_more);
    }
}
