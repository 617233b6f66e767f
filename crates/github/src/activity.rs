//! Member activity resolution.
//!
//! Only organization members count as trusted activity. Member lists are
//! fetched once per organization and cached for the lifetime of the resolver,
//! which is one process run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use lifecycle::{
    ActivityResolver, CollaboratorError, IssueRef, IssueSnapshot, OrgLogin, Timestamp,
    BOT_SIGNATURE,
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::client::{GithubClient, GithubError};
use crate::models::{ApiComment, ApiIssueEvent, ApiReview, ApiUser};

/// [`ActivityResolver`] backed by the GitHub REST API.
#[derive(Debug)]
pub struct MemberActivityResolver {
    client: GithubClient,
    members: RwLock<HashMap<OrgLogin, Arc<HashSet<String>>>>,
}

impl MemberActivityResolver {
    pub fn new(client: GithubClient) -> Self {
        Self {
            client,
            members: RwLock::new(HashMap::new()),
        }
    }

    async fn members_of(&self, org: &OrgLogin) -> Result<Arc<HashSet<String>>, GithubError> {
        if let Some(cached) = self.members.read().await.get(org) {
            return Ok(Arc::clone(cached));
        }

        let users: Vec<ApiUser> = self
            .client
            .get_paginated("list org members", &format!("/orgs/{org}/members"), &[])
            .await?;
        let logins: Arc<HashSet<String>> = Arc::new(users.into_iter().map(|u| u.login).collect());
        debug!(%org, count = logins.len(), "Loaded organization members");

        // Two concurrent misses both fetch; the second insert wins and the
        // sets are identical.
        self.members
            .write()
            .await
            .insert(org.clone(), Arc::clone(&logins));
        Ok(logins)
    }

    async fn newest_member_comment(
        &self,
        issue: &IssueSnapshot,
    ) -> Result<Option<Timestamp>, GithubError> {
        let members = self.members_of(issue.reference.repository.org()).await?;
        let comments = self.client.issue_comments(&issue.reference).await?;
        let mut newest = newest_comment(&comments, &members);

        if issue.is_pull_request {
            let reviews: Vec<ApiReview> = self
                .client
                .get_paginated("list reviews", &pulls_path(&issue.reference, "reviews"), &[])
                .await?;
            newest = newest.max(newest_review(&reviews, &members));
        }

        Ok(newest)
    }

    async fn newest_member_event(
        &self,
        issue: &IssueSnapshot,
    ) -> Result<Option<Timestamp>, GithubError> {
        let members = self.members_of(issue.reference.repository.org()).await?;
        let events: Vec<ApiIssueEvent> = self
            .client
            .get_paginated("list events", &events_path(&issue.reference), &[])
            .await?;
        Ok(newest_event(&events, &members))
    }
}

fn pulls_path(issue: &IssueRef, tail: &str) -> String {
    format!(
        "/repos/{}/{}/pulls/{}/{tail}",
        issue.repository.org(),
        issue.repository.name(),
        issue.number
    )
}

fn events_path(issue: &IssueRef) -> String {
    format!(
        "/repos/{}/{}/issues/{}/events",
        issue.repository.org(),
        issue.repository.name(),
        issue.number
    )
}

fn is_member(user: Option<&ApiUser>, members: &HashSet<String>) -> bool {
    user.is_some_and(|u| !u.is_bot() && members.contains(&u.login))
}

/// Newest comment written by a member, ignoring the manager's own comments.
fn newest_comment(comments: &[ApiComment], members: &HashSet<String>) -> Option<Timestamp> {
    let signature = BOT_SIGNATURE.trim();
    comments
        .iter()
        .filter(|c| is_member(c.user.as_ref(), members))
        .filter(|c| !c.body.as_deref().unwrap_or_default().contains(signature))
        .map(|c| Timestamp::from_utc(c.created_at))
        .max()
}

fn newest_review(reviews: &[ApiReview], members: &HashSet<String>) -> Option<Timestamp> {
    reviews
        .iter()
        .filter(|r| is_member(r.user.as_ref(), members))
        .filter_map(|r| r.submitted_at.map(Timestamp::from_utc))
        .max()
}

fn newest_event(events: &[ApiIssueEvent], members: &HashSet<String>) -> Option<Timestamp> {
    events
        .iter()
        .filter(|e| is_member(e.actor.as_ref(), members))
        .map(|e| Timestamp::from_utc(e.created_at))
        .max()
}

#[async_trait]
impl ActivityResolver for MemberActivityResolver {
    async fn latest_member_comment(
        &self,
        issue: &IssueSnapshot,
    ) -> Result<Option<Timestamp>, CollaboratorError> {
        Ok(self.newest_member_comment(issue).await?)
    }

    async fn latest_member_activity(
        &self,
        issue: &IssueSnapshot,
    ) -> Result<Option<Timestamp>, CollaboratorError> {
        Ok(self.member_signals(issue).await?.1)
    }

    /// Comments (and reviews) are listed once and feed both timestamps.
    async fn member_signals(
        &self,
        issue: &IssueSnapshot,
    ) -> Result<(Option<Timestamp>, Option<Timestamp>), CollaboratorError> {
        let comment = self.newest_member_comment(issue).await?;
        let event = self.newest_member_event(issue).await?;
        Ok((comment, event.max(comment)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn members() -> HashSet<String> {
        ["howardjohn", "linsun"].iter().map(|s| s.to_string()).collect()
    }

    fn comments() -> Vec<ApiComment> {
        serde_json::from_value(json!([
            {"id": 1, "body": "LGTM", "user": {"login": "howardjohn", "type": "User"},
             "created_at": "2020-01-01T00:00:00Z"},
            {"id": 2, "body": "ping?", "user": {"login": "drive-by", "type": "User"},
             "created_at": "2020-03-01T00:00:00Z"},
            {"id": 3, "body": format!("stale{BOT_SIGNATURE}"),
             "user": {"login": "linsun", "type": "User"},
             "created_at": "2020-04-01T00:00:00Z"},
            {"id": 4, "body": "/retest", "user": {"login": "linsun", "type": "User"},
             "created_at": "2020-02-01T00:00:00Z"}
        ]))
        .unwrap()
    }

    #[test]
    fn newest_comment_ignores_outsiders_and_bot_comments() {
        let newest = newest_comment(&comments(), &members()).unwrap();
        assert_eq!(newest.date_string(), "2020-02-01");
    }

    #[test]
    fn reviews_without_submission_time_are_skipped() {
        let reviews: Vec<ApiReview> = serde_json::from_value(json!([
            {"user": {"login": "linsun"}, "submitted_at": null},
            {"user": {"login": "howardjohn"}, "submitted_at": "2021-05-05T10:00:00Z"}
        ]))
        .unwrap();
        assert_eq!(
            newest_review(&reviews, &members()).unwrap().date_string(),
            "2021-05-05"
        );
    }

    #[test]
    fn bot_actors_never_count_as_members() {
        let events: Vec<ApiIssueEvent> = serde_json::from_value(json!([
            {"actor": {"login": "howardjohn", "type": "Bot"}, "created_at": "2021-01-01T00:00:00Z"},
            {"actor": null, "created_at": "2021-02-01T00:00:00Z"}
        ]))
        .unwrap();
        assert_eq!(newest_event(&events, &members()), None);
    }
}
