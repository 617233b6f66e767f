//! In-memory collaborators for driver tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lifecycle::{
    Action, ActivityResolver, CollaboratorError, Delay, IssueMutator, IssueNumber, IssueRef,
    IssueSnapshot, IssueSource, IssueState, LifecycleError, LifecycleStats, Pipeline,
    PipelineResolver, RepositoryId, Timestamp,
};
use manager::{Collaborators, SweepObserver};

pub fn repo(name: &str) -> RepositoryId {
    name.parse().unwrap()
}

pub fn issue_ref(repository: &str, number: u64) -> IssueRef {
    IssueRef::new(repo(repository), IssueNumber::new(number))
}

pub fn days_ago(days: u32) -> Timestamp {
    Timestamp::now().minus(Delay::days(days))
}

pub fn issue(repository: &str, number: u64, age_days: u32, labels: &[&str]) -> IssueSnapshot {
    IssueSnapshot {
        reference: issue_ref(repository, number),
        is_pull_request: false,
        created_at: days_ago(age_days),
        state: IssueState::Open,
        labels: labels.iter().map(|l| l.to_string()).collect(),
        body: String::new(),
    }
}

pub fn pull_request(repository: &str, number: u64, age_days: u32) -> IssueSnapshot {
    IssueSnapshot {
        is_pull_request: true,
        ..issue(repository, number, age_days, &[])
    }
}

#[derive(Default)]
pub struct InMemoryIssues {
    pub open: HashMap<RepositoryId, Vec<IssueSnapshot>>,
    pub unreachable: HashSet<RepositoryId>,
}

impl InMemoryIssues {
    pub fn with(mut self, snapshot: IssueSnapshot) -> Self {
        self.open
            .entry(snapshot.reference.repository.clone())
            .or_default()
            .push(snapshot);
        self
    }
}

#[async_trait]
impl IssueSource for InMemoryIssues {
    async fn open_issues(
        &self,
        repository: &RepositoryId,
    ) -> Result<Vec<IssueSnapshot>, CollaboratorError> {
        if self.unreachable.contains(repository) {
            return Err(CollaboratorError::Transport("connection reset".to_string()));
        }
        Ok(self.open.get(repository).cloned().unwrap_or_default())
    }

    async fn issue(&self, issue: &IssueRef) -> Result<Option<IssueSnapshot>, CollaboratorError> {
        Ok(self
            .open
            .get(&issue.repository)
            .and_then(|issues| issues.iter().find(|i| i.reference == *issue))
            .cloned())
    }
}

/// Reports the same timestamp for member comments and member activity.
#[derive(Default)]
pub struct FixedActivity {
    pub latest: HashMap<IssueRef, Timestamp>,
    pub failing: HashSet<IssueRef>,
    pub stall: Option<Duration>,
}

impl FixedActivity {
    async fn lookup(&self, issue: &IssueSnapshot) -> Result<Option<Timestamp>, CollaboratorError> {
        if let Some(stall) = self.stall {
            tokio::time::sleep(stall).await;
        }
        if self.failing.contains(&issue.reference) {
            return Err(CollaboratorError::Api {
                status: 502,
                message: "Bad Gateway".to_string(),
            });
        }
        Ok(self.latest.get(&issue.reference).copied())
    }
}

#[async_trait]
impl ActivityResolver for FixedActivity {
    async fn latest_member_comment(
        &self,
        issue: &IssueSnapshot,
    ) -> Result<Option<Timestamp>, CollaboratorError> {
        self.lookup(issue).await
    }

    async fn latest_member_activity(
        &self,
        issue: &IssueSnapshot,
    ) -> Result<Option<Timestamp>, CollaboratorError> {
        self.lookup(issue).await
    }
}

#[derive(Default)]
pub struct FixedPipelines(pub HashMap<IssueRef, Pipeline>);

#[async_trait]
impl PipelineResolver for FixedPipelines {
    async fn classification(
        &self,
        issue: &IssueRef,
    ) -> Result<Option<Pipeline>, CollaboratorError> {
        Ok(self.0.get(issue).cloned())
    }
}

/// Records every mutation as a line such as `add_label istio/istio#1 lifecycle/stale`.
#[derive(Default)]
pub struct RecordingMutator {
    pub calls: Mutex<Vec<String>>,
    /// Label whose addition is rejected with a 422.
    pub reject_label: Option<String>,
}

impl RecordingMutator {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl IssueMutator for RecordingMutator {
    async fn add_label(&self, issue: &IssueRef, label: &str) -> Result<(), CollaboratorError> {
        self.record(format!("add_label {issue} {label}"));
        if self.reject_label.as_deref() == Some(label) {
            return Err(CollaboratorError::Api {
                status: 422,
                message: "Validation Failed".to_string(),
            });
        }
        Ok(())
    }

    async fn remove_label(&self, issue: &IssueRef, label: &str) -> Result<(), CollaboratorError> {
        self.record(format!("remove_label {issue} {label}"));
        Ok(())
    }

    async fn upsert_bot_comment(
        &self,
        issue: &IssueRef,
        body: &str,
        _signature: &str,
    ) -> Result<(), CollaboratorError> {
        self.record(format!("upsert_comment {issue} {body}"));
        Ok(())
    }

    async fn remove_bot_comment(
        &self,
        issue: &IssueRef,
        _signature: &str,
    ) -> Result<(), CollaboratorError> {
        self.record(format!("remove_comment {issue}"));
        Ok(())
    }

    async fn close_issue(&self, issue: &IssueRef) -> Result<(), CollaboratorError> {
        self.record(format!("close {issue}"));
        Ok(())
    }
}

#[derive(Default)]
pub struct CollectingObserver {
    pub actions: Mutex<Vec<(IssueRef, Action, bool)>>,
    pub failures: Mutex<Vec<(IssueRef, String)>>,
    pub summaries: Mutex<Vec<(RepositoryId, LifecycleStats)>>,
    pub skipped: Mutex<Vec<(RepositoryId, String)>>,
}

impl SweepObserver for CollectingObserver {
    fn action(&self, issue: &IssueRef, action: &Action, dry_run: bool) {
        self.actions
            .lock()
            .unwrap()
            .push((issue.clone(), action.clone(), dry_run));
    }

    fn issue_failed(&self, issue: &IssueRef, error: &LifecycleError) {
        self.failures
            .lock()
            .unwrap()
            .push((issue.clone(), format!("{error:?}")));
    }

    fn repository_summary(&self, repository: &RepositoryId, stats: &LifecycleStats) {
        self.summaries
            .lock()
            .unwrap()
            .push((repository.clone(), *stats));
    }

    fn repository_skipped(&self, repository: &RepositoryId, reason: &LifecycleError) {
        self.skipped
            .lock()
            .unwrap()
            .push((repository.clone(), format!("{reason:?}")));
    }
}

pub struct Harness {
    pub mutator: Arc<RecordingMutator>,
    pub observer: Arc<CollectingObserver>,
    pub collaborators: Collaborators,
}

impl Harness {
    pub fn new(issues: InMemoryIssues, activity: FixedActivity, pipelines: FixedPipelines) -> Self {
        Self::with_mutator(issues, activity, pipelines, RecordingMutator::default())
    }

    pub fn with_mutator(
        issues: InMemoryIssues,
        activity: FixedActivity,
        pipelines: FixedPipelines,
        mutator: RecordingMutator,
    ) -> Self {
        let mutator = Arc::new(mutator);
        Self {
            collaborators: Collaborators {
                issues: Arc::new(issues),
                activity: Arc::new(activity),
                pipelines: Arc::new(pipelines),
                mutator: mutator.clone(),
            },
            mutator,
            observer: Arc::new(CollectingObserver::default()),
        }
    }
}
