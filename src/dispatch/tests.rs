//! End-to-end tests for the dispatch pipeline.
//!
//! Each test wires real registries and a real trigger lifecycle to a
//! recording scheduler and a static authority, then feeds raw payloads
//! through `dispatch`.

use super::*;
use crate::authority::StaticAuthority;
use crate::jobs::{Job, ScmHead};
use crate::scheduler::cause::{
    GITHUB_COMMENT, GITHUB_COMMENT_AUTHOR, GITHUB_LABEL_ADDED, GITHUB_REVIEW_AUTHOR,
    GITHUB_REVIEW_COMMENT, GITHUB_REVIEW_STATE,
};
use crate::test_utils::{
    RecordingScheduler, arb_login, arb_review_state, comment_payload, label_payload, pr_job,
    review_payload,
};
use crate::triggers::{SubscribableTrigger, TriggerLifecycle, TriggerSpec};
use crate::webhooks::EventKind;
use proptest::prelude::*;

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

type TestDispatcher = EventDispatcher<StaticAuthority, RecordingScheduler>;

fn dispatcher_with(authority: StaticAuthority, scheduler: RecordingScheduler) -> TestDispatcher {
    EventDispatcher::new(
        Arc::new(Registries::new()),
        authority,
        scheduler,
        DispatchConfig::default().with_quiet_period(Duration::from_secs(3)),
    )
}

fn dispatcher(authority: StaticAuthority) -> TestDispatcher {
    dispatcher_with(authority, RecordingScheduler::new())
}

fn subscribe_comment(d: &TestDispatcher, job: &str, pattern: &str, owner: &str, repo: &str, number: u64) {
    SubscribableTrigger::new(CommentPattern::new(pattern).unwrap())
        .start(&pr_job(job, owner, repo, number), d.registries());
}

fn subscribe_label(d: &TestDispatcher, job: &str, pattern: &str, number: u64) {
    SubscribableTrigger::new(LabelPattern::new(pattern).unwrap())
        .start(&pr_job(job, "acme", "repo", number), d.registries());
}

fn subscribe_review(d: &TestDispatcher, job: &str, states: ReviewStateSet, number: u64) {
    SubscribableTrigger::new(states).start(&pr_job(job, "acme", "repo", number), d.registries());
}

fn comment(action: &str, body: &str, author: &str) -> InboundEvent {
    InboundEvent::created(
        "delivery-1",
        EventKind::IssueComment,
        comment_payload("acme", "repo", 7, action, body, author),
    )
}

fn labeled(label: &str, sender: &str) -> InboundEvent {
    InboundEvent::created(
        "delivery-2",
        EventKind::PullRequest,
        label_payload("acme", "repo", 7, "labeled", label, sender),
    )
}

fn reviewed(action: &str, state: &str, reviewer: &str) -> InboundEvent {
    InboundEvent::created(
        "delivery-3",
        EventKind::PullRequestReview,
        review_payload("acme", "repo", 7, action, state, "Looks good", reviewer),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Comments
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn matching_comment_from_collaborator_schedules_one_build() {
    let d = dispatcher(StaticAuthority::allow(["alice"]));
    subscribe_comment(&d, "J", "deploy", "acme", "repo", 7);

    let outcome = d.dispatch(&comment("created", "deploy", "alice")).await;

    assert_eq!(outcome.scheduled().len(), 1);
    let calls = d.scheduler().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].job, JobId::new("J"));
    assert_eq!(calls[0].quiet_period, Duration::from_secs(3));
    assert_eq!(calls[0].parameters.get(GITHUB_COMMENT), Some("deploy"));
    assert_eq!(calls[0].parameters.get(GITHUB_COMMENT_AUTHOR), Some("alice"));
    assert_eq!(calls[0].cause, Cause::IssueComment {
        user_login: "alice".to_string(),
        comment: "deploy".to_string(),
        comment_pattern: "deploy".to_string(),
    });
}

#[tokio::test]
async fn edited_comment_also_triggers() {
    let d = dispatcher(StaticAuthority::allow(["alice"]));
    subscribe_comment(&d, "J", "deploy", "acme", "repo", 7);

    d.dispatch(&comment("edited", "deploy", "alice")).await;

    assert_eq!(d.scheduler().calls().len(), 1);
}

#[tokio::test]
async fn closed_action_schedules_nothing() {
    let d = dispatcher(StaticAuthority::allow(["alice"]));
    subscribe_comment(&d, "J", "deploy", "acme", "repo", 7);

    let outcome = d.dispatch(&comment("closed", "deploy", "alice")).await;

    assert_eq!(outcome, DispatchOutcome::Dropped(DropReason::IrrelevantAction));
    assert!(d.scheduler().calls().is_empty());
}

#[tokio::test]
async fn deleted_comment_schedules_nothing() {
    let d = dispatcher(StaticAuthority::allow_all());
    subscribe_comment(&d, "J", "deploy", "acme", "repo", 7);

    d.dispatch(&comment("deleted", "deploy", "alice")).await;

    assert!(d.scheduler().calls().is_empty());
}

#[tokio::test]
async fn comment_must_match_whole_pattern() {
    let d = dispatcher(StaticAuthority::allow(["alice"]));
    subscribe_comment(&d, "J", "deploy", "acme", "repo", 7);

    let outcome = d.dispatch(&comment("created", "please deploy", "alice")).await;

    let DispatchOutcome::Processed(report) = outcome else {
        panic!("expected the event to reach the subscriber");
    };
    assert_eq!(report.unmatched, vec![JobId::new("J")]);
    assert!(d.scheduler().calls().is_empty());
}

#[tokio::test]
async fn non_collaborator_schedules_nothing() {
    let d = dispatcher(StaticAuthority::allow(["alice"]));
    subscribe_comment(&d, "J", "deploy", "acme", "repo", 7);

    let outcome = d.dispatch(&comment("created", "deploy", "mallory")).await;

    let DispatchOutcome::Processed(report) = outcome else {
        panic!("expected the event to reach the subscriber");
    };
    assert_eq!(report.denied, vec![JobId::new("J")]);
    assert!(d.scheduler().calls().is_empty());
}

#[tokio::test]
async fn mixed_case_repository_reaches_subscriber() {
    let d = dispatcher(StaticAuthority::allow_all());
    subscribe_comment(&d, "J", "deploy", "Acme", "Repo", 7);

    let event = InboundEvent::created(
        "d",
        EventKind::IssueComment,
        comment_payload("ACME", "rEpO", 7, "created", "deploy", "alice"),
    );
    d.dispatch(&event).await;

    assert_eq!(d.scheduler().calls().len(), 1);
}

#[tokio::test]
async fn other_pull_request_is_not_affected() {
    let d = dispatcher(StaticAuthority::allow_all());
    subscribe_comment(&d, "J", "deploy", "acme", "repo", 8);

    let outcome = d.dispatch(&comment("created", "deploy", "alice")).await;

    assert!(matches!(
        outcome,
        DispatchOutcome::Dropped(DropReason::NoSubscribers { .. })
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Labels
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn matching_label_from_collaborator_schedules_one_build() {
    let d = dispatcher(StaticAuthority::allow(["bob"]));
    subscribe_label(&d, "J", "ready-.*", 7);

    d.dispatch(&labeled("ready-to-merge", "bob")).await;

    let calls = d.scheduler().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].parameters.get(GITHUB_LABEL_ADDED), Some("ready-to-merge"));
    assert_eq!(calls[0].cause.short_description(), "bob added label ready-to-merge");
}

#[tokio::test]
async fn label_actor_must_be_authorized() {
    let d = dispatcher(StaticAuthority::allow(["bob"]));
    subscribe_label(&d, "J", "ready-.*", 7);

    d.dispatch(&labeled("ready-to-merge", "mallory")).await;

    assert!(d.scheduler().calls().is_empty());
}

#[tokio::test]
async fn unlabeled_schedules_nothing() {
    let d = dispatcher(StaticAuthority::allow_all());
    subscribe_label(&d, "J", ".*", 7);

    let event = InboundEvent::created(
        "d",
        EventKind::PullRequest,
        label_payload("acme", "repo", 7, "unlabeled", "ready", "bob"),
    );
    let outcome = d.dispatch(&event).await;

    assert_eq!(outcome, DispatchOutcome::Dropped(DropReason::IrrelevantAction));
}

#[tokio::test]
async fn non_matching_label_schedules_nothing() {
    let d = dispatcher(StaticAuthority::allow_all());
    subscribe_label(&d, "J", "ready-.*", 7);

    d.dispatch(&labeled("wip", "bob")).await;

    assert!(d.scheduler().calls().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Reviews
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn review_with_unset_states_triggers_on_any_state() {
    let d = dispatcher(StaticAuthority::allow(["carol"]));
    subscribe_review(&d, "J", ReviewStateSet::any(), 7);

    d.dispatch(&reviewed("submitted", "commented", "carol")).await;

    let calls = d.scheduler().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].parameters.get(GITHUB_REVIEW_STATE), Some("COMMENTED"));
    assert_eq!(calls[0].parameters.get(GITHUB_REVIEW_AUTHOR), Some("carol"));
    assert_eq!(calls[0].parameters.get(GITHUB_REVIEW_COMMENT), Some("Looks good"));
}

#[tokio::test]
async fn review_state_set_filters_states() {
    let d = dispatcher(StaticAuthority::allow_all());
    subscribe_review(&d, "J", ReviewStateSet::of(["approved"]), 7);

    d.dispatch(&reviewed("submitted", "changes_requested", "carol")).await;
    assert!(d.scheduler().calls().is_empty());

    d.dispatch(&reviewed("submitted", "approved", "carol")).await;
    let calls = d.scheduler().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].cause, Cause::PullRequestReview {
        user_login: "carol".to_string(),
        state: crate::webhooks::ReviewState::Approved,
        comment: "Looks good".to_string(),
        review_states: "[approved]".to_string(),
    });
}

#[tokio::test]
async fn edited_review_triggers_but_dismissed_does_not() {
    let d = dispatcher(StaticAuthority::allow_all());
    subscribe_review(&d, "J", ReviewStateSet::any(), 7);

    d.dispatch(&reviewed("dismissed", "dismissed", "carol")).await;
    assert!(d.scheduler().calls().is_empty());

    d.dispatch(&reviewed("edited", "approved", "carol")).await;
    assert_eq!(d.scheduler().calls().len(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Fan-out and isolation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn every_matching_subscriber_gets_one_build() {
    let d = dispatcher(StaticAuthority::allow_all());
    subscribe_comment(&d, "A", "deploy", "acme", "repo", 7);
    subscribe_comment(&d, "B", "dep.*", "acme", "repo", 7);
    subscribe_comment(&d, "C", "test", "acme", "repo", 7);

    let outcome = d.dispatch(&comment("created", "deploy", "alice")).await;

    let mut jobs: Vec<JobId> = d.scheduler().calls().into_iter().map(|c| c.job).collect();
    jobs.sort();
    assert_eq!(jobs, vec![JobId::new("A"), JobId::new("B")]);
    let DispatchOutcome::Processed(report) = outcome else {
        panic!("expected processed");
    };
    assert_eq!(report.unmatched, vec![JobId::new("C")]);
}

#[tokio::test]
async fn schedule_failure_does_not_block_other_subscribers() {
    let d = dispatcher_with(StaticAuthority::allow_all(), RecordingScheduler::new().failing_for("A"));
    subscribe_comment(&d, "A", "deploy", "acme", "repo", 7);
    subscribe_comment(&d, "B", "deploy", "acme", "repo", 7);

    let outcome = d.dispatch(&comment("created", "deploy", "alice")).await;

    let DispatchOutcome::Processed(report) = outcome else {
        panic!("expected processed");
    };
    assert_eq!(report.failed, vec![JobId::new("A")]);
    assert_eq!(report.scheduled.len(), 1);
    assert_eq!(d.scheduler().calls()[0].job, JobId::new("B"));
}

#[tokio::test]
async fn families_do_not_cross() {
    let d = dispatcher(StaticAuthority::allow_all());
    subscribe_label(&d, "J", ".*", 7);

    let outcome = d.dispatch(&comment("created", "anything", "alice")).await;

    assert!(matches!(
        outcome,
        DispatchOutcome::Dropped(DropReason::NoSubscribers { .. })
    ));
}

#[tokio::test]
async fn retracted_job_is_not_triggered() {
    let d = dispatcher(StaticAuthority::allow_all());
    let lifecycle = TriggerLifecycle::new(Arc::clone(d.registries()));
    let job = Job::clone(&pr_job("J", "acme", "repo", 7));
    lifecycle
        .declare(job, &[TriggerSpec::IssueComment {
            comment_pattern: "deploy".to_string(),
        }])
        .unwrap();

    d.dispatch(&comment("created", "deploy", "alice")).await;
    lifecycle.retract(&JobId::new("J")).unwrap();
    d.dispatch(&comment("created", "deploy", "alice")).await;

    assert_eq!(d.scheduler().calls().len(), 1);
}

#[tokio::test]
async fn branch_job_never_receives_events() {
    let d = dispatcher(StaticAuthority::allow_all());
    let branch_job = Arc::new(
        Job::new("J", ScmHead::Branch {
            name: "main".to_string(),
        })
        .with_parent_source(crate::jobs::ScmSource::GitHub(crate::jobs::GitHubSource::new(
            "acme", "repo",
        ))),
    );
    SubscribableTrigger::new(CommentPattern::new(".*").unwrap()).start(&branch_job, d.registries());

    d.dispatch(&comment("created", "deploy", "alice")).await;

    assert!(d.scheduler().calls().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Envelope filtering and malformed input
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn removed_deliveries_are_dropped() {
    let d = dispatcher(StaticAuthority::allow_all());
    subscribe_comment(&d, "J", "deploy", "acme", "repo", 7);

    for delivery in [DeliveryType::Removed, DeliveryType::Other] {
        let event = InboundEvent::new(
            "d",
            EventKind::IssueComment,
            delivery,
            comment_payload("acme", "repo", 7, "created", "deploy", "alice"),
        );
        let outcome = d.dispatch(&event).await;
        assert_eq!(outcome, DispatchOutcome::Dropped(DropReason::DeliveryType { delivery }));
    }
    assert!(d.scheduler().calls().is_empty());
}

#[tokio::test]
async fn updated_deliveries_are_processed() {
    let d = dispatcher(StaticAuthority::allow_all());
    subscribe_comment(&d, "J", "deploy", "acme", "repo", 7);

    let event = InboundEvent::new(
        "d",
        EventKind::IssueComment,
        DeliveryType::Updated,
        comment_payload("acme", "repo", 7, "created", "deploy", "alice"),
    );
    d.dispatch(&event).await;

    assert_eq!(d.scheduler().calls().len(), 1);
}

#[tokio::test]
async fn unknown_kinds_are_dropped() {
    let d = dispatcher(StaticAuthority::allow_all());

    let outcome = d
        .dispatch(&InboundEvent::created("d", "push", r#"{"ref":"refs/heads/main"}"#))
        .await;

    assert_eq!(
        outcome,
        DispatchOutcome::Dropped(DropReason::UnsubscribedKind {
            kind: "push".to_string()
        })
    );
}

#[tokio::test]
async fn malformed_payload_is_dropped_and_next_event_still_works() {
    let d = dispatcher(StaticAuthority::allow_all());
    subscribe_comment(&d, "J", "deploy", "acme", "repo", 7);

    let bad = d
        .dispatch(&InboundEvent::created("d", EventKind::IssueComment, "{ not json"))
        .await;
    assert!(matches!(bad, DispatchOutcome::Dropped(DropReason::Malformed { .. })));

    d.dispatch(&comment("created", "deploy", "alice")).await;
    assert_eq!(d.scheduler().calls().len(), 1);
}

#[tokio::test]
async fn concurrent_dispatches_each_schedule_once() {
    let d = Arc::new(dispatcher(StaticAuthority::allow_all()));
    subscribe_comment(&d, "J", "deploy", "acme", "repo", 7);

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let d = Arc::clone(&d);
            tokio::spawn(async move { d.dispatch(&comment("created", "deploy", "alice")).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(d.scheduler().calls().len(), 20);
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    /// A build is scheduled iff the reviewer is allowed and the state is in
    /// the configured set.
    #[test]
    fn review_builds_require_match_and_authority(
        reviewer in arb_login(),
        allowed in prop::collection::vec(arb_login(), 0..3),
        state in arb_review_state(),
        accepted in prop::collection::btree_set(arb_review_state(), 0..3),
    ) {
        let d = dispatcher(StaticAuthority::allow(&allowed));
        let set = ReviewStateSet::of(accepted.iter().map(|s| s.as_str()));
        subscribe_review(&d, "J", set, 7);

        block_on(d.dispatch(&reviewed("submitted", state.api_name(), &reviewer)));

        let expected = allowed.contains(&reviewer) && accepted.contains(&state);
        prop_assert_eq!(d.scheduler().calls().len(), usize::from(expected));
    }

    /// Events for a different number never reach a subscriber.
    #[test]
    fn number_must_match_exactly(subscribed in 1..1000u64, event in 1..1000u64) {
        let d = dispatcher(StaticAuthority::allow_all());
        subscribe_comment(&d, "J", ".*", "acme", "repo", subscribed);

        let payload = comment_payload("acme", "repo", event, "created", "x", "alice");
        block_on(d.dispatch(&InboundEvent::created("d", EventKind::IssueComment, payload)));

        prop_assert_eq!(d.scheduler().calls().len(), usize::from(subscribed == event));
    }
}
