//! Hooks through which the driver reports what it is doing.

use lifecycle::{Action, Disposition, IssueRef, LifecycleError, LifecycleStats, RepositoryId};
use tracing::{debug, info, warn};

/// Receives the driver's log points.
///
/// The default [`TracingObserver`] turns them into `tracing` events; tests
/// substitute a collecting observer to assert on them.
pub trait SweepObserver: Send + Sync {
    /// An action was applied, or would have been in a dry run.
    fn action(&self, issue: &IssueRef, action: &Action, dry_run: bool);

    /// An issue was evaluated.
    fn evaluated(&self, issue: &IssueRef, disposition: &Disposition) {
        let _ = (issue, disposition);
    }

    /// Processing one issue failed; the sweep moves on to the next.
    fn issue_failed(&self, issue: &IssueRef, error: &LifecycleError);

    /// A repository finished processing.
    fn repository_summary(&self, repository: &RepositoryId, stats: &LifecycleStats);

    /// A repository was not processed at all.
    fn repository_skipped(&self, repository: &RepositoryId, reason: &LifecycleError);
}

/// Emits every log point as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SweepObserver for TracingObserver {
    fn action(&self, issue: &IssueRef, action: &Action, dry_run: bool) {
        if dry_run {
            info!(%issue, %action, "Would have applied action");
        } else {
            info!(%issue, %action, "Applied action");
        }
    }

    fn evaluated(&self, issue: &IssueRef, disposition: &Disposition) {
        debug!(%issue, ?disposition, "Evaluated issue");
    }

    fn issue_failed(&self, issue: &IssueRef, error: &LifecycleError) {
        warn!(%issue, %error, "Skipping issue after error");
    }

    fn repository_summary(&self, repository: &RepositoryId, stats: &LifecycleStats) {
        info!(%repository, %stats, "Lifecycle stats");
    }

    fn repository_skipped(&self, repository: &RepositoryId, reason: &LifecycleError) {
        warn!(%repository, %reason, "Skipping repository");
    }
}
