//! Tests for audit sink

use chrono::{TimeZone, Utc};
use prometheus_dispatch::core::{build_audit_event, AuditAction, AuditSink, InMemoryAuditSink};
use prometheus_dispatch::util::serde::{DriverId, JobId, OfferId};

fn at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap()
}

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);
    let offer = OfferId::generate();

    let event = build_audit_event(
        &JobId::new("job1"),
        Some(offer),
        Some(&DriverId::new("drv1")),
        AuditAction::OfferSent,
        at(),
        Some("first offer".to_string()),
    );

    sink.record(event);
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].job_id.as_str(), "job1");
    assert_eq!(events[0].offer_id, Some(offer));
    assert_eq!(events[0].action, AuditAction::OfferSent);
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);
    for job in ["job1", "job2", "job3"] {
        sink.record(build_audit_event(
            &JobId::new(job),
            None,
            None,
            AuditAction::JobEscalated,
            at(),
            None,
        ));
    }

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].job_id.as_str(), "job2"); // First one popped
    assert_eq!(events[1].job_id.as_str(), "job3");
}

#[test]
fn test_zero_capacity_sink_drops_events() {
    let mut sink = InMemoryAuditSink::new(0);
    sink.record(build_audit_event(
        &JobId::new("job1"),
        None,
        None,
        AuditAction::OfferExpired,
        at(),
        None,
    ));
    assert!(sink.events().is_empty());
}

#[test]
fn test_audit_action_names() {
    assert_eq!(AuditAction::BookingReleased.to_string(), "booking_released");
    let json = serde_json::to_string(&AuditAction::OfferDeclined).unwrap();
    assert_eq!(json, "\"offer_declined\"");
}
