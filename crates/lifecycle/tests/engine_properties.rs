//! Properties the lifecycle engine must hold across a wide range of inputs.
//!
//! Each test walks a grid of issue ages, member-comment ages, pipelines,
//! issue kinds and label sets, and checks one invariant for every point.

use lifecycle::{
    evaluate, Action, ActivitySignals, Delay, IssueNumber, IssueRef, IssueSnapshot, IssueState,
    Pipeline, PolicyRecord, Timestamp,
};
use pretty_assertions::assert_eq;

const AGES: [u32; 6] = [0, 3, 10, 35, 70, 200];
const COMMENT_AGES: [Option<u32>; 5] = [None, Some(1), Some(10), Some(35), Some(70)];
const PIPELINES: [&str; 5] = ["", "New Issues", "P0", "Backlog", "Release Blocker"];
const LABEL_SETS: [&[&str]; 7] = [
    &[],
    &["lifecycle/needs triage"],
    &["lifecycle/needs escalation", "lifecycle/stale"],
    &["lifecycle/staleproof"],
    &["enhancement"],
    &["lifecycle/automatically-closed", "area/networking"],
    &[
        "lifecycle/needs triage",
        "lifecycle/needs escalation",
        "lifecycle/stale",
        "enhancement",
    ],
];

fn policy() -> PolicyRecord {
    PolicyRecord {
        triage_delay: Delay::days(2),
        close_label: "lifecycle/automatically-closed".to_string(),
        stale_comment: "Stale since {last_activity}, closing {close_date}.".to_string(),
        close_comment: "Closed, stale since {last_activity}.".to_string(),
        ignore_labels: vec!["lifecycle/frozen".to_string()],
        ..PolicyRecord::default()
    }
}

struct Case {
    issue: IssueSnapshot,
    signals: ActivitySignals,
}

fn cases(now: Timestamp) -> Vec<Case> {
    let mut cases = Vec::new();
    for age in AGES {
        for comment in COMMENT_AGES {
            for pipeline in PIPELINES {
                for is_pull_request in [false, true] {
                    for labels in LABEL_SETS {
                        let comment = comment.map(|d| now.minus(Delay::days(d.min(age))));
                        cases.push(Case {
                            issue: IssueSnapshot {
                                reference: IssueRef::new(
                                    "istio/istio".parse().unwrap(),
                                    IssueNumber::new(1),
                                ),
                                is_pull_request,
                                created_at: now.minus(Delay::days(age)),
                                state: IssueState::Open,
                                labels: labels.iter().map(|l| l.to_string()).collect(),
                                body: String::new(),
                            },
                            signals: ActivitySignals {
                                latest_member_comment: comment,
                                latest_member_activity: comment,
                                pipeline: Pipeline::new(pipeline),
                            },
                        });
                    }
                }
            }
        }
    }
    cases
}

fn apply_labels(issue: &IssueSnapshot, actions: &[Action]) -> IssueSnapshot {
    let mut next = issue.clone();
    for action in actions {
        match action {
            Action::AddLabel { label } => next.labels.push(label.clone()),
            Action::RemoveLabel { label } => next.labels.retain(|l| l != label),
            _ => {}
        }
    }
    next
}

#[test]
fn ignore_labels_always_produce_no_actions() {
    let now = Timestamp::now();
    for mut case in cases(now) {
        case.issue.labels.push("lifecycle/frozen".to_string());
        for state in [IssueState::Open, IssueState::Closed] {
            case.issue.state = state;
            let decision = evaluate(&case.issue, &policy(), &case.signals, now);
            assert_eq!(decision.actions, vec![], "{:?}", case.issue);
        }
    }
}

#[test]
fn closed_items_only_lose_triage_and_escalation_labels() {
    let now = Timestamp::now();
    let record = policy();
    for mut case in cases(now) {
        case.issue.state = IssueState::Closed;
        let decision = evaluate(&case.issue, &record, &case.signals, now);
        for action in &decision.actions {
            match action {
                Action::RemoveLabel { label }
                    if *label == record.triage_label || *label == record.escalation_label => {}
                other => panic!("unexpected {other:?} for closed {:?}", case.issue),
            }
        }
    }
}

#[test]
fn evaluation_is_deterministic() {
    let now = Timestamp::now();
    let record = policy();
    for case in cases(now) {
        assert_eq!(
            evaluate(&case.issue, &record, &case.signals, now),
            evaluate(&case.issue, &record, &case.signals, now)
        );
    }
}

#[test]
fn applying_label_actions_reaches_a_fixed_point() {
    let now = Timestamp::now();
    let record = policy();
    for case in cases(now) {
        let first = evaluate(&case.issue, &record, &case.signals, now);
        let converged = apply_labels(&case.issue, &first.actions);
        let second = evaluate(&converged, &record, &case.signals, now);

        let label_actions: Vec<&Action> = second
            .actions
            .iter()
            .filter(|a| matches!(a, Action::AddLabel { .. } | Action::RemoveLabel { .. }))
            .collect();
        assert!(
            label_actions.is_empty(),
            "{label_actions:?} after applying {:?} to {:?}",
            first.actions,
            case.issue
        );
    }
}

#[test]
fn staleproof_items_are_never_marked_stale_or_closed() {
    let now = Timestamp::now();
    let record = policy();
    for mut case in cases(now) {
        case.issue.labels.push("lifecycle/staleproof".to_string());
        let had_stale_label = case.issue.has_label("lifecycle/stale");
        let decision = evaluate(&case.issue, &record, &case.signals, now);

        for action in &decision.actions {
            match action {
                Action::Close | Action::PostComment { .. } => {
                    panic!("staleproof {:?} got {action:?}", case.issue)
                }
                Action::AddLabel { label }
                    if *label == record.stale_label || *label == record.close_label =>
                {
                    panic!("staleproof {:?} got {action:?}", case.issue)
                }
                _ => {}
            }
        }

        // Past the triage phase, leftovers are always cleaned up.
        if decision.disposition == lifecycle::Disposition::Staleproof {
            assert!(decision.actions.contains(&Action::RemoveComment));
            if had_stale_label {
                assert!(decision
                    .actions
                    .contains(&Action::remove_label("lifecycle/stale")));
            }
        }
    }
}

#[test]
fn overdue_high_priority_items_escalate_without_going_stale() {
    let now = Timestamp::now();
    let record = policy();
    for comment_days in 8..30 {
        for pipeline in ["P0", "Release Blocker"] {
            let comment = now.minus(Delay::days(comment_days));
            let issue = IssueSnapshot {
                reference: IssueRef::new("istio/api".parse().unwrap(), IssueNumber::new(9)),
                is_pull_request: false,
                created_at: now.minus(Delay::days(45)),
                state: IssueState::Open,
                labels: vec![],
                body: String::new(),
            };
            let signals = ActivitySignals {
                latest_member_comment: Some(comment),
                latest_member_activity: Some(comment),
                pipeline: Pipeline::new(pipeline),
            };

            let decision = evaluate(&issue, &record, &signals, now);
            assert_eq!(
                decision.actions,
                vec![
                    Action::add_label("lifecycle/needs escalation"),
                    Action::RemoveComment
                ]
            );
        }
    }
}

#[test]
fn needing_triage_suppresses_staleness() {
    let now = Timestamp::now();
    let record = PolicyRecord {
        triage_delay: Delay::days(2),
        issue_stale_delay: Delay::days(30),
        issue_close_delay: Delay::days(60),
        ..policy()
    };
    let issue = IssueSnapshot {
        reference: IssueRef::new("istio/istio".parse().unwrap(), IssueNumber::new(3)),
        is_pull_request: false,
        created_at: now.minus(Delay::days(40)),
        state: IssueState::Open,
        labels: vec![],
        body: String::new(),
    };

    let decision = evaluate(&issue, &record, &ActivitySignals::default(), now);
    assert_eq!(
        decision.actions,
        vec![Action::add_label("lifecycle/needs triage")]
    );
}
