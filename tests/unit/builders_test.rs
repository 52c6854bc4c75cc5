//! Tests for engine builder

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use prometheus_dispatch::builders::EngineBuilder;
use prometheus_dispatch::config::DispatchConfig;
use prometheus_dispatch::core::{CascadeOutcome, DispatchError, DispatchStore, Job, JobStatus};
use prometheus_dispatch::infra::{InMemoryAlertSink, InMemoryStore};
use prometheus_dispatch::util::clock::ManualClock;
use prometheus_dispatch::util::serde::JobKind;

fn config() -> DispatchConfig {
    DispatchConfig::new("0123456789abcdef0123", "https://x.test/o")
}

#[test]
fn test_build_with_defaults() {
    assert!(EngineBuilder::new(config()).build().is_ok());
}

#[test]
fn test_build_rejects_invalid_config() {
    let mut cfg = config();
    cfg.sweep_interval_secs = 0;
    let err = EngineBuilder::new(cfg).build().err().expect("invalid config");
    assert!(matches!(err, DispatchError::Config(_)));
}

#[test]
fn test_context_exposes_window_policy() {
    let mut cfg = config();
    cfg.window.stagger_mins = 30;
    let ctx = EngineBuilder::new(cfg).build_context().unwrap();
    let base = Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap();
    let job = Job::new("j1", JobKind::Task, "cleaning", base).part_of("g", 3);
    assert_eq!(
        ctx.part_start(&job).unwrap(),
        Utc.with_ymd_and_hms(2025, 3, 4, 11, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_built_engine_uses_injected_collaborators() {
    let store = Arc::new(InMemoryStore::new());
    let alerts = Arc::new(InMemoryAlertSink::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 3, 8, 0, 0).unwrap(),
    ));
    let engine = EngineBuilder::new(config())
        .with_store(store.clone())
        .with_alerts(alerts.clone())
        .with_clock(clock)
        .build()
        .unwrap();

    let start = Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap();
    let job = Job::new("j1", JobKind::Task, "cleaning", start);
    store.insert_job(job.clone()).await.unwrap();

    // default directory is empty, so the job escalates
    let outcome = engine.create_offer(&job.id).await.unwrap();
    assert!(matches!(outcome, CascadeOutcome::Escalated(_)));
    assert_eq!(alerts.len(), 1);
    let stored = store.job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::ExpiredNoCandidates);
}
