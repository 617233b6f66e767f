//! Error and retry-policy types for the lifecycle domain.
//!
//! [`LifecycleError`] is the taxonomy the driver reports. Collaborators (issue
//! sources, resolvers, the GitHub client) report [`CollaboratorError`], which the
//! driver wraps with the identity of the issue or repository it was working on.
//!
//! [`RetryPolicy`] is a cross-cutting concern: the throttled API client asks a
//! [`CollaboratorError`] whether it may retry. Nothing in this crate retries.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{IssueRef, RepositoryId, Timestamp};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried once `after` has elapsed.
    Retryable { after: Duration },
    /// The operation must not be retried.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Parsing errors
// ---------------------------------------------------------------------------

/// A malformed repository or issue reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("Invalid repository name '{0}', needs to be in the form org/repo")]
    InvalidRepository(String),

    #[error("Invalid issue reference '{0}', needs to be in the form org/repo#number")]
    InvalidIssue(String),
}

/// A malformed delay string in a policy record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DelayParseError {
    #[error("Delay must not be empty")]
    Empty,

    #[error("Delay '{input}' has unknown unit '{unit}' (expected d, h, m or s)")]
    UnknownUnit { input: String, unit: char },

    #[error("Delay '{0}' has a unit with no value in front of it")]
    MissingValue(String),

    #[error("Delay '{0}' ends with a number that has no unit")]
    MissingUnit(String),

    #[error("Delay '{0}' is too large")]
    TooLarge(String),
}

/// A policy configuration that cannot be loaded.
///
/// Produced at load time; the manager never starts with an invalid policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("Repository {0} is listed more than once")]
    DuplicateRepository(RepositoryId),

    #[error("Can't have multiple lifecycle records matching the repo {0}")]
    MultipleRecords(RepositoryId),

    #[error("Lifecycle record names repo {0}, which is not a configured repository")]
    UnknownRepository(RepositoryId),

    #[error("Lifecycle override at position {0} does not name any repository")]
    EmptyOverride(usize),
}

// ---------------------------------------------------------------------------
// Collaborator errors
// ---------------------------------------------------------------------------

/// A failure reported by an external collaborator behind one of the ports.
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    /// The call did not finish within the caller's deadline.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The API rate limit is exhausted until `reset`.
    #[error("Rate limit exhausted until {reset}")]
    RateLimited { reset: Timestamp },

    /// The API answered with a non-success status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("Unable to decode response: {0}")]
    Decode(String),
}

impl CollaboratorError {
    /// Classifies the failure for the throttled client.
    ///
    /// Only rate-limit exhaustion is retryable, after the time left until the
    /// reset. Everything else, server errors included, is final.
    pub fn retry_policy(&self, now: Timestamp) -> RetryPolicy {
        match self {
            CollaboratorError::RateLimited { reset } => RetryPolicy::Retryable {
                after: reset
                    .as_datetime()
                    .signed_duration_since(now.as_datetime())
                    .to_std()
                    .unwrap_or(Duration::ZERO),
            },
            CollaboratorError::Timeout(_)
            | CollaboratorError::Api { .. }
            | CollaboratorError::Transport(_)
            | CollaboratorError::Decode(_) => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the lifecycle driver.
///
/// The engine itself cannot fail. Every variant here originates from a
/// collaborator or from configuration, and carries the identity of the issue
/// or repository being processed.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// No policy record covers the repository; it is skipped.
    #[error("No lifecycle policy configured for repo {repository}")]
    PolicyMissing { repository: RepositoryId },

    /// An activity or pipeline lookup failed; that issue is abandoned.
    #[error("Could not get {signal} for issue/PR {issue}: {source}")]
    SignalLookup {
        issue: IssueRef,
        signal: &'static str,
        #[source]
        source: CollaboratorError,
    },

    /// A GitHub mutation failed; it is re-derived on the next sweep.
    #[error("Unable to {action} on issue/PR {issue}: {source}")]
    ActionApply {
        issue: IssueRef,
        action: String,
        #[source]
        source: CollaboratorError,
    },

    /// The issues of a repository could not be enumerated.
    #[error("Unable to enumerate issues for repo {repository}: {source}")]
    Structural {
        repository: RepositoryId,
        #[source]
        source: CollaboratorError,
    },

    /// The issue does not exist (or is not visible to the bot).
    #[error("Issue/PR {0} not found")]
    IssueNotFound(IssueRef),
}
