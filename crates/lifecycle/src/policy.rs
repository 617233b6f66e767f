//! Lifecycle policy records and the per-repository registry.
//!
//! A [`PolicyRecord`] holds everything the engine needs to decide what to do
//! with an issue in one repository: label names, delays, and comment
//! templates. The [`PolicyRegistry`] resolves the record that applies to a
//! repository and rejects ambiguous configurations when it is built.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::errors::PolicyError;
use crate::ports::PolicyStore;
use crate::{Delay, RepositoryId};

/// Thresholds, label names and comment templates for one repository.
///
/// Every field has a default, so a configuration only needs to spell out what
/// it changes. Unknown keys are rejected. An empty label name disables every
/// action on that label.
///
/// Stale delays are expected to be shorter than the matching close delays.
/// A record that violates this can never reach the close path through the
/// stale path; [`PolicyRecord::ordering_violations`] reports it but nothing
/// enforces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyRecord {
    /// Label that marks an issue as a feature request.
    pub feature_request_label: String,

    /// Items carrying any of these labels are left alone entirely.
    pub ignore_labels: Vec<String>,

    /// Untriaged issues older than this no longer get the triage label.
    /// `None` means there is no age cutoff.
    pub real_old_delay: Option<Delay>,

    /// Items younger than this are not processed at all.
    pub triage_delay: Delay,
    pub triage_label: String,

    /// How long a high-priority item may go without a member comment.
    pub escalation_delay: Delay,
    pub escalation_label: String,

    pub pull_request_stale_delay: Delay,
    pub feature_request_stale_delay: Delay,
    pub issue_stale_delay: Delay,
    pub stale_label: String,
    /// Template for the staleness comment. Supports `{last_activity}` and
    /// `{close_date}`.
    pub stale_comment: String,
    #[serde(alias = "cant_be_stale_label")]
    pub staleproof_label: String,

    pub pull_request_close_delay: Delay,
    pub feature_request_close_delay: Delay,
    pub issue_close_delay: Delay,
    pub close_label: String,
    /// Template for the closing comment. Supports `{last_activity}`.
    pub close_comment: String,
}

impl Default for PolicyRecord {
    fn default() -> Self {
        Self {
            feature_request_label: "enhancement".to_string(),
            ignore_labels: Vec::new(),
            real_old_delay: None,
            triage_delay: Delay::ZERO,
            triage_label: "lifecycle/needs triage".to_string(),
            escalation_delay: Delay::days(7),
            escalation_label: "lifecycle/needs escalation".to_string(),
            pull_request_stale_delay: Delay::days(30),
            feature_request_stale_delay: Delay::days(30),
            issue_stale_delay: Delay::days(30),
            stale_label: "lifecycle/stale".to_string(),
            stale_comment: String::new(),
            staleproof_label: "lifecycle/staleproof".to_string(),
            pull_request_close_delay: Delay::days(60),
            feature_request_close_delay: Delay::days(60),
            issue_close_delay: Delay::days(60),
            close_label: String::new(),
            close_comment: String::new(),
        }
    }
}

/// Which pair of staleness thresholds applies to an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StalenessKind {
    PullRequest,
    FeatureRequest,
    Issue,
}

impl std::fmt::Display for StalenessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StalenessKind::PullRequest => "pull request",
            StalenessKind::FeatureRequest => "feature request",
            StalenessKind::Issue => "issue",
        };
        write!(f, "{name}")
    }
}

/// A `(stale, close)` delay pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessDelays {
    pub stale: Delay,
    pub close: Delay,
}

impl PolicyRecord {
    pub fn staleness_delays(&self, kind: StalenessKind) -> StalenessDelays {
        match kind {
            StalenessKind::PullRequest => StalenessDelays {
                stale: self.pull_request_stale_delay,
                close: self.pull_request_close_delay,
            },
            StalenessKind::FeatureRequest => StalenessDelays {
                stale: self.feature_request_stale_delay,
                close: self.feature_request_close_delay,
            },
            StalenessKind::Issue => StalenessDelays {
                stale: self.issue_stale_delay,
                close: self.issue_close_delay,
            },
        }
    }

    /// Kinds whose stale delay is not shorter than their close delay.
    pub fn ordering_violations(&self) -> Vec<StalenessKind> {
        [
            StalenessKind::PullRequest,
            StalenessKind::FeatureRequest,
            StalenessKind::Issue,
        ]
        .into_iter()
        .filter(|kind| {
            let delays = self.staleness_delays(*kind);
            delays.stale >= delays.close
        })
        .collect()
    }

    pub fn is_ignore_label(&self, label: &str) -> bool {
        self.ignore_labels.iter().any(|l| l == label)
    }
}

/// A record that replaces the default for the listed repositories.
///
/// Not deserialized directly: a flattened record would skip unknown keys, so
/// loaders split `repos` off and read the remainder as a [`PolicyRecord`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyOverride {
    pub repos: Vec<RepositoryId>,

    #[serde(flatten)]
    pub record: PolicyRecord,
}

/// Resolves the policy record for each configured repository.
///
/// Built once at start-up and immutable afterwards.
#[derive(Debug, Clone)]
pub struct PolicyRegistry {
    repositories: Vec<RepositoryId>,
    default: Option<PolicyRecord>,
    overrides: HashMap<RepositoryId, PolicyRecord>,
}

impl PolicyRegistry {
    /// Validates and indexes the configured records.
    ///
    /// # Errors
    ///
    /// - a repository listed twice;
    /// - an override that names no repository, or a repository that is not
    ///   configured;
    /// - two overrides claiming the same repository.
    pub fn new(
        repositories: Vec<RepositoryId>,
        default: Option<PolicyRecord>,
        overrides: Vec<PolicyOverride>,
    ) -> Result<Self, PolicyError> {
        let mut known = HashSet::new();
        for repo in &repositories {
            if !known.insert(repo.clone()) {
                return Err(PolicyError::DuplicateRepository(repo.clone()));
            }
        }

        let mut by_repo = HashMap::new();
        for (position, entry) in overrides.into_iter().enumerate() {
            if entry.repos.is_empty() {
                return Err(PolicyError::EmptyOverride(position));
            }
            for repo in entry.repos {
                if !known.contains(&repo) {
                    return Err(PolicyError::UnknownRepository(repo));
                }
                if by_repo.contains_key(&repo) {
                    return Err(PolicyError::MultipleRecords(repo));
                }
                by_repo.insert(repo, entry.record.clone());
            }
        }

        Ok(Self {
            repositories,
            default,
            overrides: by_repo,
        })
    }

    /// Every record in the registry, paired with the repositories it covers.
    pub fn records(&self) -> impl Iterator<Item = (&RepositoryId, &PolicyRecord)> {
        self.repositories
            .iter()
            .filter_map(|repo| self.record_for(repo).map(|record| (repo, record)))
    }
}

impl PolicyStore for PolicyRegistry {
    fn repositories(&self) -> &[RepositoryId] {
        &self.repositories
    }

    fn record_for(&self, repository: &RepositoryId) -> Option<&PolicyRecord> {
        if !self.repositories.contains(repository) {
            return None;
        }
        self.overrides.get(repository).or(self.default.as_ref())
    }
}
