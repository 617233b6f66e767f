//! Wire shapes of the GitHub REST API responses this crate reads.
//!
//! Only the fields the lifecycle manager needs are declared; serde ignores
//! the rest.

use chrono::{DateTime, Utc};
use lifecycle::{
    CommentId, IssueNumber, IssueRef, IssueSnapshot, IssueState, RepositoryId, Timestamp,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiUser {
    pub login: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl ApiUser {
    pub fn is_bot(&self) -> bool {
        self.kind == "Bot" || self.login.ends_with("[bot]")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiLabel {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiIssue {
    pub number: u64,
    pub state: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub labels: Vec<ApiLabel>,
    #[serde(default)]
    pub body: Option<String>,
    /// Present (with links) only when the issue is a pull request.
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

impl ApiIssue {
    pub fn into_snapshot(self, repository: &RepositoryId) -> IssueSnapshot {
        IssueSnapshot {
            reference: IssueRef::new(repository.clone(), IssueNumber::new(self.number)),
            is_pull_request: self.pull_request.is_some(),
            created_at: Timestamp::from_utc(self.created_at),
            state: if self.state == "closed" {
                IssueState::Closed
            } else {
                IssueState::Open
            },
            labels: self.labels.into_iter().map(|l| l.name).collect(),
            body: self.body.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiComment {
    pub id: CommentId,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<ApiUser>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiIssueEvent {
    #[serde(default)]
    pub actor: Option<ApiUser>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiReview {
    #[serde(default)]
    pub user: Option<ApiUser>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiRepository {
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_requests_are_recognised_by_their_link_block() {
        let repo: RepositoryId = "istio/istio".parse().unwrap();
        let issue: ApiIssue = serde_json::from_value(serde_json::json!({
            "number": 12,
            "state": "open",
            "created_at": "2019-10-01T12:00:00Z",
            "labels": [{"name": "lifecycle/stale", "color": "ededed"}],
            "body": null,
            "pull_request": {"url": "https://api.github.com/repos/istio/istio/pulls/12"}
        }))
        .unwrap();

        let snapshot = issue.into_snapshot(&repo);
        assert!(snapshot.is_pull_request);
        assert_eq!(snapshot.labels, vec!["lifecycle/stale".to_string()]);
        assert_eq!(snapshot.body, "");
        assert_eq!(snapshot.state, IssueState::Open);
        assert_eq!(snapshot.reference.to_string(), "istio/istio#12");
    }

    #[test]
    fn app_accounts_count_as_bots() {
        let user: ApiUser =
            serde_json::from_value(serde_json::json!({"login": "istio-policy-bot[bot]"})).unwrap();
        assert!(user.is_bot());

        let user: ApiUser =
            serde_json::from_value(serde_json::json!({"login": "howardjohn", "type": "User"}))
                .unwrap();
        assert!(!user.is_bot());
    }
}
