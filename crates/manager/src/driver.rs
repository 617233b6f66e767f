//! The lifecycle driver: enumerates issues, gathers signals, evaluates and
//! applies.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use lifecycle::{
    evaluate, ActivityResolver, ActivitySignals, CollaboratorError, Decision, IssueRef,
    IssueSnapshot, IssueSource, IssueState, LifecycleError, LifecycleStats, PipelineResolver,
    PolicyRecord, PolicyStore, RepositoryId, SweepId, Timestamp,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, info_span, instrument, Instrument};

use crate::executor::ActionExecutor;
use crate::observer::{SweepObserver, TracingObserver};

/// Tuning knobs for [`LifecycleManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Repositories swept at the same time.
    pub concurrency: usize,
    /// Upper bound on each activity or pipeline lookup.
    pub signal_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            signal_timeout: Duration::from_secs(30),
        }
    }
}

/// The collaborators the driver talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub issues: Arc<dyn IssueSource>,
    pub activity: Arc<dyn ActivityResolver>,
    pub pipelines: Arc<dyn PipelineResolver>,
    pub mutator: Arc<dyn lifecycle::IssueMutator>,
}

/// Outcome of sweeping one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryReport {
    pub repository: RepositoryId,
    pub stats: LifecycleStats,
    /// Issues evaluated and, outside dry runs, updated.
    pub processed: usize,
    /// Issues abandoned after a lookup or mutation error.
    pub failed: usize,
}

/// Outcome of a full sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub sweep_id: SweepId,
    pub dry_run: bool,
    /// Swept repositories, in configuration order.
    pub repositories: Vec<RepositoryReport>,
    /// Repositories without a policy record.
    pub skipped: Vec<RepositoryId>,
}

impl SweepReport {
    pub fn totals(&self) -> LifecycleStats {
        let mut totals = LifecycleStats::default();
        for repo in &self.repositories {
            totals += repo.stats;
        }
        totals
    }

    pub fn failed_issues(&self) -> usize {
        self.repositories.iter().map(|r| r.failed).sum()
    }
}

/// A sweep that attempted every repository but could not enumerate at least
/// one of them. `report` covers the repositories that were swept.
#[derive(Debug, Error)]
#[error("Lifecycle sweep incomplete")]
pub struct SweepError {
    pub report: SweepReport,
    #[source]
    pub source: LifecycleError,
}

enum RepositoryOutcome {
    Swept(RepositoryReport),
    Skipped(RepositoryId),
    Failed(LifecycleError),
}

/// Drives the lifecycle engine over every configured repository.
pub struct LifecycleManager {
    policies: Arc<dyn PolicyStore>,
    collaborators: Collaborators,
    executor: ActionExecutor,
    observer: Arc<dyn SweepObserver>,
    config: ManagerConfig,
}

impl LifecycleManager {
    pub fn new(
        policies: Arc<dyn PolicyStore>,
        collaborators: Collaborators,
        config: ManagerConfig,
    ) -> Self {
        Self::with_observer(policies, collaborators, config, Arc::new(TracingObserver))
    }

    pub fn with_observer(
        policies: Arc<dyn PolicyStore>,
        collaborators: Collaborators,
        config: ManagerConfig,
        observer: Arc<dyn SweepObserver>,
    ) -> Self {
        let executor =
            ActionExecutor::new(Arc::clone(&collaborators.mutator), Arc::clone(&observer));
        Self {
            policies,
            collaborators,
            executor,
            observer,
            config,
        }
    }

    /// Sweeps every configured repository.
    ///
    /// Per-issue failures are reported to the observer and do not stop the
    /// sweep. A repository whose issues cannot be listed is abandoned while
    /// the others carry on.
    ///
    /// # Errors
    ///
    /// Once every repository has been attempted, returns the first
    /// [`LifecycleError::Structural`] failure in configuration order together
    /// with the report for the rest.
    pub async fn sweep_all(&self, dry_run: bool) -> Result<SweepReport, SweepError> {
        let sweep_id = SweepId::new_random();
        let span = info_span!("sweep", %sweep_id, dry_run);

        async move {
            let now = Timestamp::now();
            info!(
                repositories = self.policies.repositories().len(),
                "Starting lifecycle sweep"
            );

            let mut outcomes: Vec<(usize, RepositoryOutcome)> =
                stream::iter(self.policies.repositories().iter().enumerate())
                    .map(|(index, repository)| async move {
                        (index, self.sweep_repository(repository, now, dry_run).await)
                    })
                    .buffer_unordered(self.config.concurrency.max(1))
                    .collect()
                    .await;
            outcomes.sort_by_key(|(index, _)| *index);

            let mut report = SweepReport {
                sweep_id,
                dry_run,
                repositories: Vec::new(),
                skipped: Vec::new(),
            };
            let mut first_failure = None;
            for (_, outcome) in outcomes {
                match outcome {
                    RepositoryOutcome::Swept(repo) => report.repositories.push(repo),
                    RepositoryOutcome::Skipped(repository) => report.skipped.push(repository),
                    RepositoryOutcome::Failed(err) => {
                        first_failure.get_or_insert(err);
                    }
                }
            }

            info!(totals = %report.totals(), "Lifecycle sweep finished");
            match first_failure {
                Some(source) => Err(SweepError { report, source }),
                None => Ok(report),
            }
        }
        .instrument(span)
        .await
    }

    /// Evaluates and updates a single issue. Never a dry run.
    ///
    /// Issues in unmonitored repositories, or repositories without a policy
    /// record, are left alone and yield an empty decision.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::IssueNotFound`] if the issue does not exist, and
    /// any lookup or mutation failure for the issue.
    #[instrument(
        skip_all,
        fields(
            org = %issue.repository.org(),
            repo = %issue.repository.name(),
            number = %issue.number
        )
    )]
    pub async fn manage_one(&self, issue: &IssueRef) -> Result<Decision, LifecycleError> {
        if !self.policies.repositories().contains(&issue.repository) {
            info!("Repository is not monitored, ignoring issue");
            return Ok(Decision::default());
        }
        let Some(policy) = self.policies.record_for(&issue.repository) else {
            self.observer.repository_skipped(
                &issue.repository,
                &LifecycleError::PolicyMissing {
                    repository: issue.repository.clone(),
                },
            );
            return Ok(Decision::default());
        };

        let snapshot = self
            .collaborators
            .issues
            .issue(issue)
            .await
            .map_err(|source| LifecycleError::SignalLookup {
                issue: issue.clone(),
                signal: "issue",
                source,
            })?
            .ok_or_else(|| LifecycleError::IssueNotFound(issue.clone()))?;

        self.process_issue(&snapshot, policy, Timestamp::now(), false)
            .await
    }

    async fn sweep_repository(
        &self,
        repository: &RepositoryId,
        now: Timestamp,
        dry_run: bool,
    ) -> RepositoryOutcome {
        let span = info_span!(
            "repository",
            org = %repository.org(),
            repo = %repository.name()
        );
        async move {
            let Some(policy) = self.policies.record_for(repository) else {
                self.observer.repository_skipped(
                    repository,
                    &LifecycleError::PolicyMissing {
                        repository: repository.clone(),
                    },
                );
                return RepositoryOutcome::Skipped(repository.clone());
            };

            let issues = match self.collaborators.issues.open_issues(repository).await {
                Ok(issues) => issues,
                Err(source) => {
                    let err = LifecycleError::Structural {
                        repository: repository.clone(),
                        source,
                    };
                    self.observer.repository_skipped(repository, &err);
                    return RepositoryOutcome::Failed(err);
                }
            };

            let mut report = RepositoryReport {
                repository: repository.clone(),
                stats: LifecycleStats::default(),
                processed: 0,
                failed: 0,
            };
            for issue in &issues {
                match self.process_issue(issue, policy, now, dry_run).await {
                    Ok(decision) => {
                        report.stats += decision.stats;
                        report.processed += 1;
                    }
                    Err(err) => {
                        self.observer.issue_failed(&issue.reference, &err);
                        report.failed += 1;
                    }
                }
            }

            self.observer.repository_summary(repository, &report.stats);
            RepositoryOutcome::Swept(report)
        }
        .instrument(span)
        .await
    }

    async fn process_issue(
        &self,
        issue: &IssueSnapshot,
        policy: &PolicyRecord,
        now: Timestamp,
        dry_run: bool,
    ) -> Result<Decision, LifecycleError> {
        // The engine never reads signals for closed items.
        let signals = if issue.state == IssueState::Closed {
            ActivitySignals::default()
        } else {
            self.resolve_signals(issue).await?
        };

        let decision = evaluate(issue, policy, &signals, now);
        self.observer.evaluated(&issue.reference, &decision.disposition);
        self.executor
            .apply(&issue.reference, &decision.actions, dry_run)
            .await?;
        Ok(decision)
    }

    async fn resolve_signals(
        &self,
        issue: &IssueSnapshot,
    ) -> Result<ActivitySignals, LifecycleError> {
        let c = &self.collaborators;
        let ((latest_member_comment, latest_member_activity), pipeline) = futures::try_join!(
            self.bounded(
                &issue.reference,
                "member activity",
                c.activity.member_signals(issue)
            ),
            self.bounded(
                &issue.reference,
                "pipeline",
                c.pipelines.classification(&issue.reference)
            ),
        )?;

        Ok(ActivitySignals {
            latest_member_comment,
            latest_member_activity,
            pipeline,
        })
    }

    async fn bounded<T>(
        &self,
        issue: &IssueRef,
        signal: &'static str,
        lookup: impl Future<Output = Result<T, CollaboratorError>>,
    ) -> Result<T, LifecycleError> {
        let timeout = self.config.signal_timeout;
        let source = match tokio::time::timeout(timeout, lookup).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(source)) => source,
            Err(_) => CollaboratorError::Timeout(timeout),
        };
        Err(LifecycleError::SignalLookup {
            issue: issue.clone(),
            signal,
            source,
        })
    }
}
