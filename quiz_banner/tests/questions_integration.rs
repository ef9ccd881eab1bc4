//! Integration tests for the tenant-scoped question store.
//!
//! Quota boundaries per tier, defaults on create, ownership isolation,
//! bulk deletion and reordering.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use quiz_banner::{
    Tier,
    clock::ManualClock,
    db::MemoryStore,
    questions::{NewQuestion, QuestionError, QuestionManager},
    tier::limit_for,
};
use std::sync::Arc;

fn manager() -> QuestionManager {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 9, 1, 7, 30, 0).unwrap());
    QuestionManager::new(Arc::new(MemoryStore::new()), Arc::new(clock))
}

fn card(n: usize) -> NewQuestion {
    NewQuestion::new(format!("Question {n}"), format!("Answer {n}"))
}

async fn fill(manager: &QuestionManager, owner: &str, tier: Tier, n: usize) -> Vec<String> {
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        ids.push(manager.create(owner, tier, card(i)).await.unwrap().id);
    }
    ids
}

#[tokio::test]
async fn test_quota_boundary_per_tier() {
    for tier in [Tier::Free, Tier::Premium] {
        let manager = manager();
        let limit = limit_for(tier);
        fill(&manager, "owner", tier, limit).await;

        match manager.create("owner", tier, card(limit)).await {
            Err(QuestionError::QuotaExceeded {
                current,
                limit: reported,
                tier: reported_tier,
            }) => {
                assert_eq!(current, limit);
                assert_eq!(reported, limit);
                assert_eq!(reported_tier, tier);
            }
            other => panic!("expected QuotaExceeded, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_free_deck_grows_after_upgrade() {
    let manager = manager();
    fill(&manager, "upgrader", Tier::Free, 10).await;
    assert!(manager.create("upgrader", Tier::Free, card(10)).await.is_err());
    assert!(manager.create("upgrader", Tier::Premium, card(10)).await.is_ok());
}

#[tokio::test]
async fn test_create_then_get_returns_defaults() {
    let manager = manager();
    let created = manager
        .create("guest_rt", Tier::Free, NewQuestion::new("2 + 2?", "4"))
        .await
        .unwrap();

    let fetched = manager.get(&created.id, "guest_rt").await.unwrap();
    assert_eq!(fetched, created);
    assert_eq!(fetched.question, "2 + 2?");
    assert_eq!(fetched.answer, "4");
    assert_eq!(fetched.times_reviewed, 0);
    assert_eq!(fetched.performance_score, 0.5);
    assert_eq!(fetched.duration, 5);
}

#[tokio::test]
async fn test_ownership_isolation() {
    let manager = manager();
    let ids = fill(&manager, "p1", Tier::Free, 2).await;

    assert!(matches!(
        manager.get(&ids[0], "p2").await,
        Err(QuestionError::NotFound)
    ));
    assert!(!manager.delete(&ids[0], "p2").await.unwrap());
    assert_eq!(manager.delete_all("p2").await.unwrap(), 0);
    assert_eq!(manager.list("p1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_all_reports_count() {
    let manager = manager();
    fill(&manager, "bulk", Tier::Free, 7).await;

    assert_eq!(manager.delete_all("bulk").await.unwrap(), 7);
    assert!(manager.list("bulk").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reorder_scenario() {
    let manager = manager();
    let ids = fill(&manager, "deck", Tier::Free, 3).await;
    let (a, b, c) = (ids[0].clone(), ids[1].clone(), ids[2].clone());

    manager
        .reorder("deck", &[c.clone(), a.clone(), b.clone()])
        .await
        .unwrap();

    let listed = manager.list("deck").await.unwrap();
    let orders: Vec<(String, i32)> = listed.into_iter().map(|q| (q.id, q.order)).collect();
    assert_eq!(orders, vec![(c, 0), (a, 1), (b, 2)]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_create_succeeds_iff_under_limit(existing in 0usize..12) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let manager = manager();
            let start = existing.min(limit_for(Tier::Free));
            fill(&manager, "p", Tier::Free, start).await;
            let result = manager.create("p", Tier::Free, card(start)).await;
            prop_assert_eq!(result.is_ok(), start < limit_for(Tier::Free));
            Ok(())
        })?;
    }
}
