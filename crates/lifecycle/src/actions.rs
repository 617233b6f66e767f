//! The engine's output: data-only actions and per-decision statistics.

use serde::{Deserialize, Serialize};

/// Trailing text that identifies comments written by the lifecycle manager.
///
/// Exactly one comment carrying this signature exists on an item at a time;
/// posting a new one replaces the old.
pub const BOT_SIGNATURE: &str = "\n\n_Created by the issue and PR lifecycle manager_.";

/// Which bot comment an action posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentKind {
    Staleness,
    Closing,
}

impl std::fmt::Display for CommentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommentKind::Staleness => write!(f, "staleness"),
            CommentKind::Closing => write!(f, "closing"),
        }
    }
}

/// One idempotent change to an issue or pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    AddLabel { label: String },
    RemoveLabel { label: String },
    /// Create or replace the bot comment with `body` (signature not included).
    PostComment { kind: CommentKind, body: String },
    /// Delete the bot comment if one exists.
    RemoveComment,
    Close,
}

impl Action {
    pub fn add_label(label: impl Into<String>) -> Self {
        Action::AddLabel {
            label: label.into(),
        }
    }

    pub fn remove_label(label: impl Into<String>) -> Self {
        Action::RemoveLabel {
            label: label.into(),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::AddLabel { label } => write!(f, "add the `{label}` label"),
            Action::RemoveLabel { label } => write!(f, "remove the `{label}` label"),
            Action::PostComment { kind, .. } => write!(f, "add {kind} comment"),
            Action::RemoveComment => write!(f, "remove comment"),
            Action::Close => write!(f, "close"),
        }
    }
}

/// Counts of lifecycle transitions, summed per repository for the sweep log.
///
/// Has no effect on what gets applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleStats {
    pub marked_stale: u32,
    pub closed: u32,
    pub marked_needs_triage: u32,
    pub marked_needs_escalation: u32,
}

impl LifecycleStats {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl std::ops::AddAssign for LifecycleStats {
    fn add_assign(&mut self, rhs: Self) {
        self.marked_stale += rhs.marked_stale;
        self.closed += rhs.closed;
        self.marked_needs_triage += rhs.marked_needs_triage;
        self.marked_needs_escalation += rhs.marked_needs_escalation;
    }
}

impl std::fmt::Display for LifecycleStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "markedStale {}, closed {}, markedNeedsTriage {}, markedNeedsEscalation {}",
            self.marked_stale, self.closed, self.marked_needs_triage, self.marked_needs_escalation
        )
    }
}

/// Why an evaluation produced the actions it did.
///
/// Drivers log this; it never changes what gets applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum Disposition {
    /// Younger than the triage delay.
    TooNew,
    /// Carries the named ignore label.
    Ignored { label: String },
    /// Already closed; only label bookkeeping was considered.
    Closed,
    /// Waiting for a maintainer to triage it.
    NeedsTriage,
    /// Exempt from staleness handling.
    Staleproof,
    /// Due for closing.
    Closing,
    /// Past the stale delay.
    Stale,
    /// Recently active.
    #[default]
    Active,
}

/// Result of evaluating one issue: the ordered actions and the stats delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub actions: Vec<Action>,
    pub stats: LifecycleStats,
    pub disposition: Disposition,
}

impl Decision {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
