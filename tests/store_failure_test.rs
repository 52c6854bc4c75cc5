//! Store failures in the middle of a transition.
//!
//! Each test makes one store call fail and checks that the job is left either
//! untouched or in a state the next sweep picks up, never half-way.

mod common;

use chrono::Duration;
use common::*;
use prometheus_dispatch::core::{
    CascadeOutcome, DispatchError, JobStatus, OfferAction, OfferStatus, ResponseCode,
};
use prometheus_dispatch::util::serde::DriverId;

#[tokio::test]
async fn test_failed_decline_leaves_offer_live() {
    let h = Harness::new();
    h.add_drivers([driver("a", 4.0), driver("b", 3.75)]);
    let job = h.add_job(task("j1", tuesday(10, 0))).await;
    let token = offered(&h.engine.create_offer(&job).await.unwrap()).token.clone();

    h.store.fail_next("close_offer");
    let err = h
        .engine
        .respond_to_offer(&token, OfferAction::Decline)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Backend(_)), "{err:?}");

    let offers = h.store.offers_for_job(&job);
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].status, OfferStatus::Sent);
    assert_eq!(h.job(&job).await.status, JobStatus::Offered);
    assert!(h.exclusions(&job).await.is_empty());

    let retried = h
        .engine
        .respond_to_offer(&token, OfferAction::Decline)
        .await
        .unwrap();
    assert_eq!(retried.code, ResponseCode::Declined);
    match retried.cascade {
        Some(CascadeOutcome::Offered(issued)) => assert_eq!(issued.offer.driver_id.as_str(), "b"),
        other => panic!("expected offer to b, got {other:?}"),
    }
}

#[tokio::test]
async fn test_decline_commits_before_cascade_failure() {
    let h = Harness::new();
    h.add_drivers([driver("a", 4.0), driver("b", 3.75)]);
    let job = h.add_job(task("j1", tuesday(10, 0))).await;
    let token = offered(&h.engine.create_offer(&job).await.unwrap()).token.clone();

    // the cascade after the decline cannot read exclusions
    h.store.fail_next("exclusions");
    assert!(h
        .engine
        .respond_to_offer(&token, OfferAction::Decline)
        .await
        .is_err());

    let offers = h.store.offers_for_job(&job);
    assert_eq!(offers[0].status, OfferStatus::Declined);
    assert_eq!(h.job(&job).await.status, JobStatus::OfferPending);
    assert_eq!(h.exclusions(&job).await, vec![DriverId::new("a")]);

    let report = h.engine.sweep_expired_offers().await.unwrap();
    assert_eq!(report.resumed, 1);
    assert_eq!(report.reoffered, 1);
    let sent: Vec<_> = h
        .store
        .offers_for_job(&job)
        .into_iter()
        .filter(|o| o.status == OfferStatus::Sent)
        .collect();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].driver_id.as_str(), "b");
}

#[tokio::test]
async fn test_expiry_survives_cascade_failure() {
    let h = Harness::new();
    h.add_drivers([driver("a", 4.0), driver("b", 3.75)]);
    let job = h.add_job(task("j1", tuesday(10, 0))).await;
    h.engine.create_offer(&job).await.unwrap();
    h.advance(Duration::hours(2));

    h.store.fail_next("exclusions");
    let report = h.engine.sweep_expired_offers().await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.resumed, 1);
    assert_eq!(report.reoffered, 1);

    let offers = h.store.offers_for_job(&job);
    assert_eq!(offers.len(), 2);
    assert_eq!(offers[0].status, OfferStatus::Expired);
    assert_eq!(offers[1].status, OfferStatus::Sent);
    assert_eq!(offers[1].driver_id.as_str(), "b");
    assert_eq!(h.exclusions(&job).await, vec![DriverId::new("a")]);
}

#[tokio::test]
async fn test_failed_issue_leaves_job_pending() {
    let h = Harness::new();
    h.add_drivers([driver("a", 4.0)]);
    let job = h.add_job(task("j1", tuesday(10, 0))).await;

    h.store.fail_next("issue_offer");
    assert!(matches!(
        h.engine.create_offer(&job).await,
        Err(DispatchError::Backend(_))
    ));
    assert!(h.store.offers_for_job(&job).is_empty());
    assert_eq!(h.job(&job).await.status, JobStatus::OfferPending);
    assert!(h.outbox.sent().is_empty());

    // a pending job re-enters the cascade when dispatch is retried
    let outcome = h.engine.create_offer(&job).await.unwrap();
    assert_eq!(offered(&outcome).offer.driver_id.as_str(), "a");
    assert_eq!(h.job(&job).await.status, JobStatus::Offered);
}

#[tokio::test]
async fn test_failed_conflict_release_keeps_offer_sent() {
    let h = Harness::new();
    h.add_drivers([driver("a", 4.0), driver("b", 3.75)]);
    let job = h.add_job(task("j1", tuesday(10, 0))).await;
    let token = offered(&h.engine.create_offer(&job).await.unwrap()).token.clone();
    h.store
        .seed_booking(booking("elsewhere", "a", tuesday(9, 30), tuesday(11, 0)));

    h.store.fail_next("close_offer");
    assert!(h
        .engine
        .respond_to_offer(&token, OfferAction::Accept)
        .await
        .is_err());
    assert_eq!(h.store.offers_for_job(&job)[0].status, OfferStatus::Sent);
    assert_eq!(h.job(&job).await.status, JobStatus::Offered);
    assert!(h.exclusions(&job).await.is_empty());

    let retried = h
        .engine
        .respond_to_offer(&token, OfferAction::Accept)
        .await
        .unwrap();
    assert_eq!(retried.code, ResponseCode::ScheduleConflict);
    assert_eq!(h.exclusions(&job).await, vec![DriverId::new("a")]);
    assert!(matches!(retried.cascade, Some(CascadeOutcome::Offered(_))));
}
