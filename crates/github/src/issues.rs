//! [`IssueSource`] and [`IssueMutator`] over the GitHub issues API.

use async_trait::async_trait;
use lifecycle::{
    CollaboratorError, CommentId, IssueMutator, IssueRef, IssueSnapshot, IssueSource, RepositoryId,
};
use reqwest::Method;
use serde_json::json;
use tracing::{debug, instrument};

use crate::client::{GithubClient, GithubError};
use crate::models::{ApiComment, ApiIssue};

fn issue_path(issue: &IssueRef) -> String {
    format!(
        "/repos/{}/{}/issues/{}",
        issue.repository.org(),
        issue.repository.name(),
        issue.number
    )
}

/// GitHub bodies may come back with `\r\n` line endings.
fn normalize_newlines(body: &str) -> String {
    body.replace("\r\n", "\n")
}

impl GithubClient {
    pub(crate) async fn issue_comments(
        &self,
        issue: &IssueRef,
    ) -> Result<Vec<ApiComment>, GithubError> {
        self.get_paginated(
            "list comments",
            &format!("{}/comments", issue_path(issue)),
            &[],
        )
        .await
    }

    /// Comments on `issue` whose body carries `signature`.
    async fn bot_comments(
        &self,
        issue: &IssueRef,
        signature: &str,
    ) -> Result<Vec<ApiComment>, GithubError> {
        let signature = normalize_newlines(signature);
        Ok(self
            .issue_comments(issue)
            .await?
            .into_iter()
            .filter(|c| {
                c.body
                    .as_deref()
                    .is_some_and(|b| normalize_newlines(b).contains(&signature))
            })
            .collect())
    }

    async fn delete_comment(
        &self,
        issue: &IssueRef,
        comment_id: CommentId,
    ) -> Result<(), GithubError> {
        let path = format!(
            "/repos/{}/{}/issues/comments/{}",
            issue.repository.org(),
            issue.repository.name(),
            comment_id
        );
        match self
            .send("delete comment", || self.request(Method::DELETE, &path))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn create_comment(&self, issue: &IssueRef, body: &str) -> Result<(), GithubError> {
        let path = format!("{}/comments", issue_path(issue));
        let payload = json!({ "body": body });
        self.send("create comment", || {
            self.request(Method::POST, &path).json(&payload)
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl IssueSource for GithubClient {
    #[instrument(skip_all, fields(repository = %repository))]
    async fn open_issues(
        &self,
        repository: &RepositoryId,
    ) -> Result<Vec<IssueSnapshot>, CollaboratorError> {
        let path = format!("/repos/{}/{}/issues", repository.org(), repository.name());
        let issues: Vec<ApiIssue> = self
            .get_paginated("list issues", &path, &[("state", "open")])
            .await?;
        debug!(count = issues.len(), "Fetched open issues");
        Ok(issues
            .into_iter()
            .map(|i| i.into_snapshot(repository))
            .collect())
    }

    async fn issue(&self, issue: &IssueRef) -> Result<Option<IssueSnapshot>, CollaboratorError> {
        match self
            .get_json::<ApiIssue>("get issue", &issue_path(issue))
            .await
        {
            Ok(found) => Ok(Some(found.into_snapshot(&issue.repository))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl IssueMutator for GithubClient {
    async fn add_label(&self, issue: &IssueRef, label: &str) -> Result<(), CollaboratorError> {
        let path = format!("{}/labels", issue_path(issue));
        let payload = json!({ "labels": [label] });
        self.send("add label", || {
            self.request(Method::POST, &path).json(&payload)
        })
        .await?;
        Ok(())
    }

    async fn remove_label(&self, issue: &IssueRef, label: &str) -> Result<(), CollaboratorError> {
        let path = format!(
            "{}/labels/{}",
            issue_path(issue),
            urlencoding::encode(label)
        );
        match self
            .send("remove label", || self.request(Method::DELETE, &path))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip_all, fields(issue = %issue))]
    async fn upsert_bot_comment(
        &self,
        issue: &IssueRef,
        body: &str,
        signature: &str,
    ) -> Result<(), CollaboratorError> {
        let existing = self.bot_comments(issue, signature).await?;
        let wanted = normalize_newlines(body);

        if let [only] = existing.as_slice() {
            if only.body.as_deref().map(normalize_newlines).as_deref() == Some(wanted.as_str()) {
                debug!("Bot comment already up to date");
                return Ok(());
            }
        }

        for stale in &existing {
            self.delete_comment(issue, stale.id).await?;
        }
        self.create_comment(issue, body).await?;
        Ok(())
    }

    async fn remove_bot_comment(
        &self,
        issue: &IssueRef,
        signature: &str,
    ) -> Result<(), CollaboratorError> {
        for comment in self.bot_comments(issue, signature).await? {
            self.delete_comment(issue, comment.id).await?;
        }
        Ok(())
    }

    async fn close_issue(&self, issue: &IssueRef) -> Result<(), CollaboratorError> {
        let path = issue_path(issue);
        let payload = json!({ "state": "closed" });
        self.send("close issue", || {
            self.request(Method::PATCH, &path).json(&payload)
        })
        .await?;
        Ok(())
    }
}
