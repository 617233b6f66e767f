//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging, for example,
//! an [`IssueNumber`] with a [`CommentId`] even though both are `u64` under the
//! hood.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::IdentifierError;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for u64-wrapped newtypes (GitHub-assigned integers).
// Generates: struct (Copy), new(), as_u64(), Display.
// ---------------------------------------------------------------------------
macro_rules! u64_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: GitHub-integer-backed
// ---------------------------------------------------------------------------

u64_id! {
    /// The per-repository number GitHub assigns to an issue or pull request.
    ///
    /// Issues and pull requests share one number space within a repository.
    IssueNumber
}

u64_id! {
    /// The global identifier of an issue comment.
    CommentId
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed
// ---------------------------------------------------------------------------

string_id! {
    /// A GitHub organization (or user) login, e.g. `"istio"`.
    OrgLogin
}

string_id! {
    /// A repository name within an organization, e.g. `"istio"` in `istio/istio`.
    RepoName
}

/// Identifies a GitHub repository, written `"org/repo"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryId {
    org: OrgLogin,
    name: RepoName,
}

impl RepositoryId {
    /// Creates a repository identifier from its two halves.
    pub fn new(org: OrgLogin, name: RepoName) -> Self {
        Self { org, name }
    }

    /// The owning organization.
    pub fn org(&self) -> &OrgLogin {
        &self.org
    }

    /// The repository name within the organization.
    pub fn name(&self) -> &RepoName {
        &self.name
    }
}

impl FromStr for RepositoryId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (org, name) = s
            .split_once('/')
            .ok_or_else(|| IdentifierError::InvalidRepository(s.to_string()))?;
        if name.contains('/') {
            return Err(IdentifierError::InvalidRepository(s.to_string()));
        }
        match (OrgLogin::new(org.trim()), RepoName::new(name.trim())) {
            (Some(org), Some(name)) => Ok(Self { org, name }),
            _ => Err(IdentifierError::InvalidRepository(s.to_string())),
        }
    }
}

impl TryFrom<String> for RepositoryId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepositoryId> for String {
    fn from(value: RepositoryId) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.org, self.name)
    }
}

/// Identifies one issue or pull request, written `"org/repo#123"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssueRef {
    /// Repository the issue lives in.
    pub repository: RepositoryId,
    /// Issue or pull request number.
    pub number: IssueNumber,
}

impl IssueRef {
    pub fn new(repository: RepositoryId, number: IssueNumber) -> Self {
        Self { repository, number }
    }
}

impl FromStr for IssueRef {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (repo, number) = s
            .rsplit_once('#')
            .ok_or_else(|| IdentifierError::InvalidIssue(s.to_string()))?;
        let number = number
            .trim()
            .parse::<u64>()
            .map_err(|_| IdentifierError::InvalidIssue(s.to_string()))?;
        Ok(Self {
            repository: repo.parse()?,
            number: IssueNumber::new(number),
        })
    }
}

impl std::fmt::Display for IssueRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.repository, self.number)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single bulk sweep.
///
/// Generated fresh for every sweep; recorded on the sweep span so all activity
/// from one sweep can be correlated in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SweepId(Uuid);

impl SweepId {
    /// Generates a new random sweep identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for SweepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_id_parses_org_and_name() {
        let repo: RepositoryId = "istio/istio.io".parse().unwrap();
        assert_eq!(repo.org().as_str(), "istio");
        assert_eq!(repo.name().as_str(), "istio.io");
        assert_eq!(repo.to_string(), "istio/istio.io");
    }

    #[test]
    fn repository_id_rejects_malformed_names() {
        for bad in ["istio", "/istio", "istio/", "a/b/c", ""] {
            assert!(bad.parse::<RepositoryId>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn repository_id_deserializes_from_string() {
        let repo: RepositoryId = serde_json::from_str("\"istio/api\"").unwrap();
        assert_eq!(repo.to_string(), "istio/api");
        assert!(serde_json::from_str::<RepositoryId>("\"api\"").is_err());
    }

    #[test]
    fn issue_ref_round_trips_through_display() {
        let issue: IssueRef = "istio/istio#4242".parse().unwrap();
        assert_eq!(issue.number, IssueNumber::new(4242));
        assert_eq!(issue.to_string(), "istio/istio#4242");
    }

    #[test]
    fn issue_ref_requires_a_number() {
        assert!("istio/istio".parse::<IssueRef>().is_err());
        assert!("istio/istio#abc".parse::<IssueRef>().is_err());
    }

    #[test]
    fn string_ids_reject_empty_values() {
        assert!(OrgLogin::new("").is_none());
        assert!(RepoName::new("api").is_some());
    }
}
