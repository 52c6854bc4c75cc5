//! Tests for alert sinks

use chrono::{TimeZone, Utc};
use prometheus_dispatch::core::{AdminAlertSink, AlertContext};
use prometheus_dispatch::infra::{InMemoryAlertSink, JsonlAlertSink};
use prometheus_dispatch::util::serde::{Capability, DriverId, JobId, JobKind};

fn alert(job: &str) -> AlertContext {
    let start = Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap();
    AlertContext {
        job_id: JobId::new(job),
        kind: JobKind::Task,
        capability: Capability::new("cleaning"),
        scheduled_start: start,
        part_start: start,
        location: Some("Dock 4".into()),
        excluded: vec![DriverId::new("a"), DriverId::new("b")],
        reason: "no eligible drivers remain (2 excluded)".into(),
    }
}

#[tokio::test]
async fn test_in_memory_alerts() {
    let sink = InMemoryAlertSink::new();
    assert!(sink.is_empty());
    sink.notify(&alert("j1")).await.unwrap();
    assert_eq!(sink.len(), 1);
    assert_eq!(sink.alerts()[0].job_id.as_str(), "j1");
}

#[tokio::test]
async fn test_jsonl_sink_persists_and_reloads() {
    let dir = std::env::temp_dir().join(format!("dispatch-alerts-{}", uuid::Uuid::new_v4()));

    let sink = JsonlAlertSink::open(&dir, "escalations").unwrap();
    assert!(sink.alerts().is_empty());
    sink.notify(&alert("j1")).await.unwrap();
    sink.notify(&alert("j2")).await.unwrap();

    let contents = std::fs::read_to_string(sink.path()).unwrap();
    assert_eq!(contents.lines().count(), 2);
    drop(sink);

    let reopened = JsonlAlertSink::open(&dir, "escalations").unwrap();
    let alerts = reopened.alerts();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[1], alert("j2"));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_jsonl_sink_rejects_corrupt_file() {
    let dir = std::env::temp_dir().join(format!("dispatch-alerts-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("escalations.jsonl"), "{not json}\n").unwrap();

    assert!(JsonlAlertSink::open(&dir, "escalations").is_err());
    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_jsonl_sink_concurrent_notifications_keep_whole_lines() {
    let dir = std::env::temp_dir().join(format!("dispatch-alerts-{}", uuid::Uuid::new_v4()));
    let sink = std::sync::Arc::new(JsonlAlertSink::open(&dir, "escalations").unwrap());

    let tasks = (0..20).map(|i| {
        let sink = std::sync::Arc::clone(&sink);
        tokio::spawn(async move { sink.notify(&alert(&format!("j{i}"))).await })
    });
    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }
    assert_eq!(sink.alerts().len(), 20);

    let reopened = JsonlAlertSink::open(&dir, "escalations").unwrap();
    let mut jobs: Vec<String> = reopened
        .alerts()
        .iter()
        .map(|a| a.job_id.as_str().to_string())
        .collect();
    jobs.sort();
    jobs.dedup();
    assert_eq!(jobs.len(), 20);

    std::fs::remove_dir_all(&dir).unwrap();
}
