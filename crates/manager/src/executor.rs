//! Applies engine actions through the [`IssueMutator`] port.

use std::sync::Arc;

use lifecycle::{Action, IssueMutator, IssueRef, LifecycleError, BOT_SIGNATURE};

use crate::observer::SweepObserver;

/// Turns [`Action`]s into GitHub mutations.
///
/// Actions are applied in order. The first failure stops the run and is
/// returned; the remaining actions are re-derived on the next sweep.
#[derive(Clone)]
pub struct ActionExecutor {
    mutator: Arc<dyn IssueMutator>,
    observer: Arc<dyn SweepObserver>,
}

impl ActionExecutor {
    pub fn new(mutator: Arc<dyn IssueMutator>, observer: Arc<dyn SweepObserver>) -> Self {
        Self { mutator, observer }
    }

    /// Applies `actions` to `issue`, or only reports them when `dry_run` is set.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ActionApply`] for the first action the
    /// mutator rejects.
    pub async fn apply(
        &self,
        issue: &IssueRef,
        actions: &[Action],
        dry_run: bool,
    ) -> Result<(), LifecycleError> {
        for action in actions {
            if !dry_run {
                self.apply_one(issue, action).await?;
            }
            self.observer.action(issue, action, dry_run);
        }
        Ok(())
    }

    async fn apply_one(&self, issue: &IssueRef, action: &Action) -> Result<(), LifecycleError> {
        let result = match action {
            Action::AddLabel { label } => self.mutator.add_label(issue, label).await,
            Action::RemoveLabel { label } => self.mutator.remove_label(issue, label).await,
            Action::PostComment { body, .. } => {
                let signed = format!("{body}{BOT_SIGNATURE}");
                self.mutator
                    .upsert_bot_comment(issue, &signed, BOT_SIGNATURE)
                    .await
            }
            Action::RemoveComment => self.mutator.remove_bot_comment(issue, BOT_SIGNATURE).await,
            Action::Close => self.mutator.close_issue(issue).await,
        };

        result.map_err(|source| LifecycleError::ActionApply {
            issue: issue.clone(),
            action: action.to_string(),
            source,
        })
    }
}
