//! Integration tests for the engagement state machine
//!
//! Driven over the in-memory ledger with a recording claim-gateway double,
//! including the concurrency races the atomic claims must win exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use questline::db::schemas::{
    CampaignDoc, QuestCategory, QuestDoc, ReviewStatus, UserDoc,
};
use questline::db::{LedgerStore, MemoryLedger};
use questline::gateway::{reconcile::reconcile_pending_claims, ClaimGateway};
use questline::rewards::level_for;
use questline::types::{EngagementError, ReviewDecision, SkipReason, TaskKind};
use questline::{EngagementService, Result};

/// Gateway double that records every grant and can be switched to fail
#[derive(Default)]
struct RecordingGateway {
    claims: Mutex<Vec<(String, String)>>,
    mints: Mutex<Vec<(u32, String)>>,
    fail: AtomicBool,
}

impl RecordingGateway {
    fn claim_count(&self) -> usize {
        self.claims.lock().unwrap().len()
    }

    fn mint_count(&self) -> usize {
        self.mints.lock().unwrap().len()
    }

    fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClaimGateway for RecordingGateway {
    async fn allow_claim(&self, user_id: &str, contract_address: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EngagementError::ClaimGatewayUnavailable(
                "executor down".into(),
            ));
        }
        self.claims
            .lock()
            .unwrap()
            .push((user_id.to_string(), contract_address.to_string()));
        Ok(())
    }

    async fn allow_mint(&self, level: u32, user_id: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EngagementError::ClaimGatewayUnavailable(
                "executor down".into(),
            ));
        }
        self.mints
            .lock()
            .unwrap()
            .push((level, user_id.to_string()));
        Ok(())
    }
}

struct Harness {
    ledger: Arc<MemoryLedger>,
    gateway: Arc<RecordingGateway>,
    service: Arc<EngagementService>,
}

fn harness() -> Harness {
    let ledger = Arc::new(MemoryLedger::new());
    let gateway = Arc::new(RecordingGateway::default());
    let service = Arc::new(EngagementService::new(ledger.clone(), gateway.clone()));
    Harness {
        ledger,
        gateway,
        service,
    }
}

fn user(user_id: &str) -> UserDoc {
    UserDoc::new(user_id.to_string(), format!("{} display", user_id))
}

fn quest(quest_id: &str, xp: i64) -> QuestDoc {
    QuestDoc {
        quest_id: quest_id.to_string(),
        title: format!("Quest {}", quest_id),
        task_kind: TaskKind::Quest,
        reward_xp: xp,
        ..Default::default()
    }
}

fn campaign_quest(quest_id: &str, campaign_id: &str, xp: i64) -> QuestDoc {
    QuestDoc {
        quest_id: quest_id.to_string(),
        title: format!("Quest {}", quest_id),
        task_kind: TaskKind::CampaignQuest,
        campaign_id: Some(campaign_id.to_string()),
        reward_xp: xp,
        ..Default::default()
    }
}

fn review_quest(quest_id: &str, campaign_id: &str, xp: i64) -> QuestDoc {
    QuestDoc {
        requires_review: true,
        task_kind: TaskKind::CampaignQuest,
        ..campaign_quest(quest_id, campaign_id, xp)
    }
}

fn campaign(campaign_id: &str, quests: i64) -> CampaignDoc {
    CampaignDoc {
        campaign_id: campaign_id.to_string(),
        title: format!("Campaign {}", campaign_id),
        no_of_quests: quests,
        contract_address: Some(format!("0x{}", campaign_id)),
        ..Default::default()
    }
}

#[tokio::test]
async fn concurrent_completions_accrue_exactly_once() {
    let h = harness();
    h.ledger.seed_user(user("alice"));
    h.ledger.seed_quest(quest("q1", 300));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let service = h.service.clone();
        handles.push(tokio::spawn(async move {
            service.complete_auto_task("alice", "q1").await.unwrap()
        }));
    }

    let mut applied = 0;
    for handle in handles {
        let outcome = handle.await.unwrap();
        if outcome.applied {
            applied += 1;
        } else {
            assert_eq!(outcome.reason, Some(SkipReason::AlreadyCompleted));
        }
    }
    assert_eq!(applied, 1);

    let alice = h.ledger.user("alice").await.unwrap().unwrap();
    assert_eq!(alice.xp, 300);
    assert_eq!(alice.quests_completed, 1);

    let record = h
        .ledger
        .completion(TaskKind::Quest, "alice", "q1")
        .await
        .unwrap()
        .unwrap();
    assert!(record.done);
}

#[tokio::test]
async fn duplicate_completion_reports_success_not_error() {
    let h = harness();
    h.ledger.seed_user(user("alice"));
    h.ledger.seed_quest(quest("q1", 100));

    let first = h.service.complete_auto_task("alice", "q1").await.unwrap();
    assert!(first.applied);

    let second = h.service.complete_auto_task("alice", "q1").await.unwrap();
    assert!(!second.applied);
    assert_eq!(second.reason, Some(SkipReason::AlreadyCompleted));
}

#[tokio::test]
async fn unknown_user_and_quest_fail_without_mutation() {
    let h = harness();
    h.ledger.seed_user(user("alice"));
    h.ledger.seed_quest(quest("q1", 100));

    assert!(matches!(
        h.service.complete_auto_task("alice", "missing").await,
        Err(EngagementError::NotFound(_))
    ));
    assert!(matches!(
        h.service.complete_auto_task("nobody", "q1").await,
        Err(EngagementError::NotFound(_))
    ));

    let alice = h.ledger.user("alice").await.unwrap().unwrap();
    assert_eq!(alice.xp, 0);
}

#[tokio::test]
async fn reward_crossing_threshold_mints_once_per_tier() {
    let h = harness();
    h.ledger.seed_user(user("alice"));
    h.ledger.seed_quest(quest("big", 1200));
    h.ledger.seed_quest(quest("small", 100));

    h.service.complete_auto_task("alice", "big").await.unwrap();

    let alice = h.ledger.user("alice").await.unwrap().unwrap();
    assert_eq!(alice.xp, 1200);
    assert_eq!(level_for(alice.xp), 1);
    assert_eq!(h.gateway.mint_count(), 1);
    assert_eq!(
        h.gateway.mints.lock().unwrap()[0],
        (1, "alice".to_string())
    );

    // Another completion inside the same tier must not repeat the call
    h.service.complete_auto_task("alice", "small").await.unwrap();
    assert_eq!(h.gateway.mint_count(), 1);

    // Confirmation moves the level from pending to badges
    assert!(h.service.confirm_mint("alice", 1).await.unwrap());
    let alice = h.ledger.user("alice").await.unwrap().unwrap();
    assert!(alice.badges.contains(&1));
    assert!(alice.pending_mints.is_empty());

    // Confirming again is a no-op
    assert!(!h.service.confirm_mint("alice", 1).await.unwrap());
}

#[tokio::test]
async fn sub_threshold_xp_stays_level_zero_and_never_mints() {
    let h = harness();
    h.ledger.seed_user(user("alice"));
    h.ledger.seed_quest(quest("q1", 999));

    h.service.complete_auto_task("alice", "q1").await.unwrap();

    let alice = h.ledger.user("alice").await.unwrap().unwrap();
    assert_eq!(level_for(alice.xp), 0);
    assert_eq!(h.gateway.mint_count(), 0);
}

#[tokio::test]
async fn campaign_completion_claims_exactly_once() {
    let h = harness();
    h.ledger.seed_user(user("alice"));
    h.ledger.seed_campaign(campaign("c1", 3));
    for id in ["a", "b", "c"] {
        h.ledger.seed_quest(campaign_quest(id, "c1", 100));
    }

    h.service.complete_auto_task("alice", "a").await.unwrap();
    assert_eq!(h.gateway.claim_count(), 0);

    // B and C race concurrently; whichever lands last triggers the claim
    let s1 = h.service.clone();
    let s2 = h.service.clone();
    let (r1, r2) = tokio::join!(
        tokio::spawn(async move { s1.complete_auto_task("alice", "b").await }),
        tokio::spawn(async move { s2.complete_auto_task("alice", "c").await }),
    );
    r1.unwrap().unwrap();
    r2.unwrap().unwrap();

    assert_eq!(h.gateway.claim_count(), 1);
    assert_eq!(
        h.gateway.claims.lock().unwrap()[0],
        ("alice".to_string(), "0xc1".to_string())
    );

    let record = h
        .ledger
        .campaign_completed("alice", "c1")
        .await
        .unwrap()
        .unwrap();
    assert!(record.claimed);
    assert!(!record.claim_pending);

    let alice = h.ledger.user("alice").await.unwrap().unwrap();
    assert_eq!(alice.tasks_completed, 3);
    assert_eq!(alice.xp, 300);
}

#[tokio::test]
async fn gateway_outage_defers_claim_and_reconciles() {
    let h = harness();
    h.ledger.seed_user(user("alice"));
    h.ledger.seed_campaign(campaign("c1", 1));
    h.ledger.seed_quest(campaign_quest("only", "c1", 100));

    h.gateway.set_failing(true);
    let outcome = h.service.complete_auto_task("alice", "only").await.unwrap();
    // The user-facing completion is unaffected by the outage
    assert!(outcome.applied);

    let record = h
        .ledger
        .campaign_completed("alice", "c1")
        .await
        .unwrap()
        .unwrap();
    assert!(!record.claimed);
    assert!(record.claim_pending);
    assert_eq!(h.gateway.claim_count(), 0);

    // The sweep re-drives only the gateway call, not the completion
    h.gateway.set_failing(false);
    let ledger: Arc<dyn LedgerStore> = h.ledger.clone();
    let gateway: Arc<dyn ClaimGateway> = h.gateway.clone();
    let resolved = reconcile_pending_claims(&ledger, &gateway).await;
    assert_eq!(resolved, 1);
    assert_eq!(h.gateway.claim_count(), 1);

    let record = h
        .ledger
        .campaign_completed("alice", "c1")
        .await
        .unwrap()
        .unwrap();
    assert!(record.claimed);
    assert!(!record.claim_pending);

    let alice = h.ledger.user("alice").await.unwrap().unwrap();
    assert_eq!(alice.xp, 100);
}

#[tokio::test]
async fn undeployed_contract_defers_claim_without_error() {
    let h = harness();
    h.ledger.seed_user(user("alice"));
    h.ledger.seed_campaign(CampaignDoc {
        contract_address: None,
        ..campaign("c1", 1)
    });
    h.ledger.seed_quest(campaign_quest("only", "c1", 100));

    h.service.complete_auto_task("alice", "only").await.unwrap();

    let record = h
        .ledger
        .campaign_completed("alice", "c1")
        .await
        .unwrap()
        .unwrap();
    assert!(record.claim_pending);
    assert_eq!(h.gateway.claim_count(), 0);
}

#[tokio::test]
async fn moderation_accept_applies_reward_through_shared_path() {
    let h = harness();
    h.ledger.seed_user(user("alice"));
    h.ledger.seed_user(user("mod"));
    h.ledger.seed_campaign(campaign("c1", 1));
    h.ledger.seed_quest(review_quest("rq", "c1", 400));

    let submission = h
        .service
        .submit_evidence("alice", "rq", "https://proof.example/1")
        .await
        .unwrap();
    assert_eq!(submission.status, ReviewStatus::Pending);

    h.service
        .review_submission(&submission.submission_id, ReviewDecision::Accept, "mod")
        .await
        .unwrap();

    let stored = h
        .ledger
        .submission(&submission.submission_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, ReviewStatus::Done);
    assert_eq!(stored.validated_by.as_deref(), Some("mod display"));

    let record = h
        .ledger
        .completion(TaskKind::CampaignQuest, "alice", "rq")
        .await
        .unwrap()
        .unwrap();
    assert!(record.done);
    assert_eq!(record.status, ReviewStatus::Done);

    let alice = h.ledger.user("alice").await.unwrap().unwrap();
    assert_eq!(alice.xp, 400);
    // Single campaign quest, so acceptance also unlocked the claim
    assert_eq!(h.gateway.claim_count(), 1);
}

#[tokio::test]
async fn accepting_twice_conflicts_without_double_pay() {
    let h = harness();
    h.ledger.seed_user(user("alice"));
    h.ledger.seed_user(user("mod"));
    h.ledger.seed_campaign(campaign("c1", 2));
    h.ledger.seed_quest(review_quest("rq", "c1", 400));

    let submission = h
        .service
        .submit_evidence("alice", "rq", "https://proof.example/1")
        .await
        .unwrap();

    h.service
        .review_submission(&submission.submission_id, ReviewDecision::Accept, "mod")
        .await
        .unwrap();

    let second = h
        .service
        .review_submission(&submission.submission_id, ReviewDecision::Accept, "mod")
        .await;
    assert!(matches!(second, Err(EngagementError::Conflict(_))));

    let alice = h.ledger.user("alice").await.unwrap().unwrap();
    assert_eq!(alice.xp, 400);
    assert_eq!(alice.tasks_completed, 1);
}

#[tokio::test]
async fn reject_moves_to_retry_and_leaves_xp_unchanged() {
    let h = harness();
    h.ledger.seed_user(user("alice"));
    h.ledger.seed_user(user("mod"));
    h.ledger.seed_campaign(campaign("c1", 1));
    h.ledger.seed_quest(review_quest("rq", "c1", 400));

    let submission = h
        .service
        .submit_evidence("alice", "rq", "https://proof.example/1")
        .await
        .unwrap();

    h.service
        .review_submission(&submission.submission_id, ReviewDecision::Reject, "mod")
        .await
        .unwrap();

    let stored = h
        .ledger
        .submission(&submission.submission_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, ReviewStatus::Retry);
    assert_eq!(stored.validated_by.as_deref(), Some("mod display"));

    let record = h
        .ledger
        .completion(TaskKind::CampaignQuest, "alice", "rq")
        .await
        .unwrap()
        .unwrap();
    assert!(!record.done);
    assert_eq!(record.status, ReviewStatus::Retry);

    let alice = h.ledger.user("alice").await.unwrap().unwrap();
    assert_eq!(alice.xp, 0);

    // Rejected submissions are no longer actionable
    let again = h
        .service
        .review_submission(&submission.submission_id, ReviewDecision::Accept, "mod")
        .await;
    assert!(matches!(again, Err(EngagementError::Conflict(_))));
}

#[tokio::test]
async fn resubmission_reopens_review_and_can_be_accepted() {
    let h = harness();
    h.ledger.seed_user(user("alice"));
    h.ledger.seed_user(user("mod"));
    h.ledger.seed_campaign(campaign("c1", 1));
    h.ledger.seed_quest(review_quest("rq", "c1", 400));

    let submission = h
        .service
        .submit_evidence("alice", "rq", "https://proof.example/1")
        .await
        .unwrap();

    // Re-submitting while still pending is a conflict
    assert!(matches!(
        h.service
            .submit_evidence("alice", "rq", "https://proof.example/2")
            .await,
        Err(EngagementError::Conflict(_))
    ));

    h.service
        .review_submission(&submission.submission_id, ReviewDecision::Reject, "mod")
        .await
        .unwrap();

    let resubmitted = h
        .service
        .submit_evidence("alice", "rq", "https://proof.example/2")
        .await
        .unwrap();
    assert_eq!(resubmitted.status, ReviewStatus::Pending);
    assert_eq!(resubmitted.evidence_link, "https://proof.example/2");

    h.service
        .review_submission(&submission.submission_id, ReviewDecision::Accept, "mod")
        .await
        .unwrap();

    let alice = h.ledger.user("alice").await.unwrap().unwrap();
    assert_eq!(alice.xp, 400);

    // Evidence after terminal completion reports already-completed
    assert!(matches!(
        h.service
            .submit_evidence("alice", "rq", "https://proof.example/3")
            .await,
        Err(EngagementError::AlreadyCompleted(_))
    ));
}

#[tokio::test]
async fn auto_completion_rejects_review_gated_quests() {
    let h = harness();
    h.ledger.seed_user(user("alice"));
    h.ledger.seed_campaign(campaign("c1", 1));
    h.ledger.seed_quest(review_quest("rq", "c1", 400));

    assert!(matches!(
        h.service.complete_auto_task("alice", "rq").await,
        Err(EngagementError::Conflict(_))
    ));
}

#[tokio::test]
async fn timed_quest_gates_until_timer_elapses() {
    let h = harness();
    h.ledger.seed_user(user("alice"));
    h.ledger.seed_quest(QuestDoc {
        quest_id: "timed".into(),
        title: "Timed".into(),
        task_kind: TaskKind::EcosystemQuest,
        category: QuestCategory::Ecosystem,
        reward_xp: 250,
        duration_secs: Some(1),
        ..Default::default()
    });

    // Completing before starting is NotReady
    assert!(matches!(
        h.service.complete_auto_task("alice", "timed").await,
        Err(EngagementError::NotReady(_))
    ));

    h.service.start_timed_quest("alice", "timed").await.unwrap();

    // Timer not yet elapsed
    assert!(matches!(
        h.service.complete_auto_task("alice", "timed").await,
        Err(EngagementError::NotReady(_))
    ));

    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

    let outcome = h.service.complete_auto_task("alice", "timed").await.unwrap();
    assert!(outcome.applied);

    // Not repeatable once claimed
    let again = h.service.complete_auto_task("alice", "timed").await.unwrap();
    assert!(!again.applied);
    assert_eq!(again.reason, Some(SkipReason::AlreadyCompleted));

    // Starting again reports the terminal state
    assert!(matches!(
        h.service.start_timed_quest("alice", "timed").await,
        Err(EngagementError::AlreadyCompleted(_))
    ));

    let alice = h.ledger.user("alice").await.unwrap().unwrap();
    assert_eq!(alice.xp, 250);
}

#[tokio::test]
async fn recurring_quest_completable_again_after_expiry() {
    let h = harness();
    h.ledger.seed_user(user("alice"));
    h.ledger.seed_quest(QuestDoc {
        quest_id: "daily".into(),
        title: "Daily check-in".into(),
        task_kind: TaskKind::Quest,
        category: QuestCategory::Daily,
        reward_xp: 50,
        ..Default::default()
    });

    let first = h.service.complete_auto_task("alice", "daily").await.unwrap();
    assert!(first.applied);

    let record = h
        .ledger
        .completion(TaskKind::Quest, "alice", "daily")
        .await
        .unwrap()
        .unwrap();
    assert!(record.expires.is_some());

    // Until the sweep runs, the duplicate is an idempotent no-op
    let blocked = h.service.complete_auto_task("alice", "daily").await.unwrap();
    assert!(!blocked.applied);

    // Simulate the day passing: purge at a future instant
    let future = bson::DateTime::from_millis(
        bson::DateTime::now().timestamp_millis() + 25 * 3600 * 1000,
    );
    let removed = h.ledger.purge_expired_completions(future).await.unwrap();
    assert_eq!(removed, 1);

    // Re-completion is allowed by design after expiry
    let second = h.service.complete_auto_task("alice", "daily").await.unwrap();
    assert!(second.applied);

    let alice = h.ledger.user("alice").await.unwrap().unwrap();
    assert_eq!(alice.xp, 100);
    assert_eq!(alice.quests_completed, 2);
}
