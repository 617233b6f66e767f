//! Port traits implemented by infrastructure crates.
//!
//! The lifecycle manager depends only on these traits. The `github` crate
//! implements them over the GitHub and ZenHub REST APIs; tests implement them
//! in memory.

use async_trait::async_trait;

use crate::errors::CollaboratorError;
use crate::policy::PolicyRecord;
use crate::{IssueRef, IssueSnapshot, Pipeline, RepositoryId, Timestamp};

/// Enumerates issues and pull requests.
#[async_trait]
pub trait IssueSource: Send + Sync {
    /// Every open issue and pull request in `repository`.
    ///
    /// A failure here is structural: the repository cannot be swept.
    async fn open_issues(
        &self,
        repository: &RepositoryId,
    ) -> Result<Vec<IssueSnapshot>, CollaboratorError>;

    /// The current state of one issue or pull request, or `None` if it does
    /// not exist.
    async fn issue(&self, issue: &IssueRef) -> Result<Option<IssueSnapshot>, CollaboratorError>;
}

/// Answers "when did a trusted organization member last touch this item?"
#[async_trait]
pub trait ActivityResolver: Send + Sync {
    /// Newest comment by an organization member, if any.
    async fn latest_member_comment(
        &self,
        issue: &IssueSnapshot,
    ) -> Result<Option<Timestamp>, CollaboratorError>;

    /// Newest activity of any kind by an organization member, if any.
    async fn latest_member_activity(
        &self,
        issue: &IssueSnapshot,
    ) -> Result<Option<Timestamp>, CollaboratorError>;

    /// `(latest_member_comment, latest_member_activity)` in one call.
    ///
    /// Resolvers whose two lookups share remote reads override this so the
    /// driver fetches them once per issue.
    async fn member_signals(
        &self,
        issue: &IssueSnapshot,
    ) -> Result<(Option<Timestamp>, Option<Timestamp>), CollaboratorError> {
        let comment = self.latest_member_comment(issue).await?;
        let activity = self.latest_member_activity(issue).await?;
        Ok((comment, activity))
    }
}

/// Looks up the board classification of an issue.
#[async_trait]
pub trait PipelineResolver: Send + Sync {
    /// The pipeline the issue sits in, or `None` if it is not on the board.
    async fn classification(&self, issue: &IssueRef)
        -> Result<Option<Pipeline>, CollaboratorError>;
}

/// Mutations the action executor needs from the GitHub API.
///
/// Implementations must throttle themselves; callers never retry.
#[async_trait]
pub trait IssueMutator: Send + Sync {
    async fn add_label(&self, issue: &IssueRef, label: &str) -> Result<(), CollaboratorError>;

    /// Removing a label the item does not carry succeeds.
    async fn remove_label(&self, issue: &IssueRef, label: &str) -> Result<(), CollaboratorError>;

    /// Creates the bot comment identified by `signature`, or replaces it if
    /// its text differs from `body`. Never leaves two comments carrying the
    /// signature.
    async fn upsert_bot_comment(
        &self,
        issue: &IssueRef,
        body: &str,
        signature: &str,
    ) -> Result<(), CollaboratorError>;

    /// Deletes the bot comment identified by `signature`, if present.
    async fn remove_bot_comment(
        &self,
        issue: &IssueRef,
        signature: &str,
    ) -> Result<(), CollaboratorError>;

    async fn close_issue(&self, issue: &IssueRef) -> Result<(), CollaboratorError>;
}

/// Resolves the policy record that applies to a repository.
pub trait PolicyStore: Send + Sync {
    /// Repositories under management, in configuration order.
    fn repositories(&self) -> &[RepositoryId];

    /// The record for `repository`, or `None` if the repository should be
    /// skipped.
    fn record_for(&self, repository: &RepositoryId) -> Option<&PolicyRecord>;
}
