//! The lifecycle decision procedure.
//!
//! [`evaluate`] maps an issue snapshot, its repository's policy record, the
//! member-activity signals and the current time to the list of actions that
//! moves the issue into its correct lifecycle state. It performs no I/O and
//! holds no state, so it may run concurrently for any number of issues.
//!
//! Checks run in a fixed order and the earlier ones short-circuit:
//!
//! 1. too new to process;
//! 2. carries an ignore label;
//! 3. closed, so only triage/escalation bookkeeping;
//! 4. needs triage (issues only);
//! 5. needs escalation;
//! 6. staleproof;
//! 7. stale or due for closing.
//!
//! Triage and escalation are evaluated independently and can both apply.
//! Needing triage ends the evaluation, as does staleproof.

use crate::actions::{Action, CommentKind, Decision, Disposition};
use crate::policy::{PolicyRecord, StalenessKind};
use crate::{ActivitySignals, IssueSnapshot, IssueState, Pipeline, Timestamp};

/// Placeholder for the date of the last member comment (or creation).
pub const LAST_ACTIVITY_PLACEHOLDER: &str = "{last_activity}";

/// Placeholder for the date on which a stale item will be closed.
pub const CLOSE_DATE_PLACEHOLDER: &str = "{close_date}";

/// One pass over the label set, classifying what the item carries.
#[derive(Debug, Default)]
struct LabelScan<'a> {
    triage: bool,
    escalation: bool,
    staleproof: bool,
    stale: bool,
    feature_request: bool,
    close: bool,
    ignored_by: Option<&'a str>,
}

impl<'a> LabelScan<'a> {
    fn of(issue: &'a IssueSnapshot, policy: &PolicyRecord) -> Self {
        let mut scan = LabelScan::default();
        for label in &issue.labels {
            let label = label.as_str();
            if policy.is_ignore_label(label) {
                scan.ignored_by = Some(label);
                break;
            }
            scan.triage |= is_configured(label, &policy.triage_label);
            scan.escalation |= is_configured(label, &policy.escalation_label);
            scan.staleproof |= is_configured(label, &policy.staleproof_label);
            scan.stale |= is_configured(label, &policy.stale_label);
            scan.feature_request |= is_configured(label, &policy.feature_request_label);
            scan.close |= is_configured(label, &policy.close_label);
        }
        scan
    }
}

fn is_configured(label: &str, configured: &str) -> bool {
    !configured.is_empty() && label == configured
}

/// Computes the actions that bring `issue` in line with `policy` at `now`.
///
/// Every label addition is conditional on the label being absent, so applying
/// the result and evaluating again yields no further label additions.
pub fn evaluate(
    issue: &IssueSnapshot,
    policy: &PolicyRecord,
    signals: &ActivitySignals,
    now: Timestamp,
) -> Decision {
    let mut decision = Decision::default();

    if now.is_within(issue.created_at, policy.triage_delay) {
        decision.disposition = Disposition::TooNew;
        return decision;
    }

    let labels = LabelScan::of(issue, policy);
    if let Some(label) = labels.ignored_by {
        decision.disposition = Disposition::Ignored {
            label: label.to_string(),
        };
        return decision;
    }

    if issue.state == IssueState::Closed {
        remove_label_if_present(&mut decision, labels.triage, &policy.triage_label);
        remove_label_if_present(&mut decision, labels.escalation, &policy.escalation_label);
        decision.disposition = Disposition::Closed;
        return decision;
    }

    if !issue.is_pull_request {
        if needs_triage(signals) {
            let recent_enough = policy
                .real_old_delay
                .map_or(true, |delay| issue.created_at > now.minus(delay));

            if recent_enough {
                decision.stats.marked_needs_triage += 1;
                add_label_unless_present(&mut decision, labels.triage, &policy.triage_label);
                decision.disposition = Disposition::NeedsTriage;
                return decision;
            }
        } else {
            remove_label_if_present(&mut decision, labels.triage, &policy.triage_label);
        }
    }

    // With no member comment ever, age counts from creation.
    let reference = signals.latest_member_comment.unwrap_or(issue.created_at);

    if is_high_priority(signals) && now.is_later_than(reference, policy.escalation_delay) {
        decision.stats.marked_needs_escalation += 1;
        add_label_unless_present(&mut decision, labels.escalation, &policy.escalation_label);
    } else {
        remove_label_if_present(&mut decision, labels.escalation, &policy.escalation_label);
    }

    if labels.staleproof {
        remove_label_if_present(&mut decision, labels.stale, &policy.stale_label);
        decision.actions.push(Action::RemoveComment);
        decision.disposition = Disposition::Staleproof;
        return decision;
    }

    let kind = if issue.is_pull_request {
        StalenessKind::PullRequest
    } else if labels.feature_request {
        StalenessKind::FeatureRequest
    } else {
        StalenessKind::Issue
    };
    let delays = policy.staleness_delays(kind);

    if now.is_later_than(reference, delays.close) {
        decision.stats.closed += 1;
        decision.actions.push(Action::Close);
        push_comment(
            &mut decision,
            CommentKind::Closing,
            render_template(&policy.close_comment, reference, None),
        );
        add_label_unless_present(&mut decision, labels.close, &policy.close_label);
        decision.disposition = Disposition::Closing;
    } else if now.is_later_than(reference, delays.stale) {
        decision.stats.marked_stale += 1;
        push_comment(
            &mut decision,
            CommentKind::Staleness,
            render_template(
                &policy.stale_comment,
                reference,
                Some(reference.plus(delays.close)),
            ),
        );
        add_label_unless_present(&mut decision, labels.stale, &policy.stale_label);
        decision.disposition = Disposition::Stale;
    } else {
        remove_label_if_present(&mut decision, labels.stale, &policy.stale_label);
        decision.actions.push(Action::RemoveComment);
        decision.disposition = Disposition::Active;
    }

    decision
}

/// An issue needs triage when it is not on the board yet, or when no
/// organization member has ever commented on it or otherwise touched it.
pub fn needs_triage(signals: &ActivitySignals) -> bool {
    let unclassified = signals.pipeline.as_ref().map_or(true, Pipeline::is_untriaged);
    let untouched =
        signals.latest_member_comment.is_none() && signals.latest_member_activity.is_none();
    unclassified || untouched
}

pub fn is_high_priority(signals: &ActivitySignals) -> bool {
    signals
        .pipeline
        .as_ref()
        .is_some_and(Pipeline::is_high_priority)
}

/// Fills the `{last_activity}` and `{close_date}` placeholders.
pub fn render_template(
    template: &str,
    last_activity: Timestamp,
    close_date: Option<Timestamp>,
) -> String {
    let mut rendered = template.replace(LAST_ACTIVITY_PLACEHOLDER, &last_activity.date_string());
    if let Some(close_date) = close_date {
        rendered = rendered.replace(CLOSE_DATE_PLACEHOLDER, &close_date.date_string());
    }
    rendered
}

fn add_label_unless_present(decision: &mut Decision, present: bool, label: &str) {
    if !present && !label.is_empty() {
        decision.actions.push(Action::add_label(label));
    }
}

fn remove_label_if_present(decision: &mut Decision, present: bool, label: &str) {
    if present {
        decision.actions.push(Action::remove_label(label));
    }
}

// An empty template means the repository wants no bot comment at all.
fn push_comment(decision: &mut Decision, kind: CommentKind, body: String) {
    if body.trim().is_empty() {
        decision.actions.push(Action::RemoveComment);
    } else {
        decision.actions.push(Action::PostComment { kind, body });
    }
}
