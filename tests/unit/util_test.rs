//! Tests for shared utilities

use chrono::{Duration, TimeZone, Utc};
use prometheus_dispatch::util::clock::{Clock, ManualClock};
use prometheus_dispatch::util::serde::{DriverId, JobKind, OfferId};

#[test]
fn test_ids_serialize_transparently() {
    let id = DriverId::new("drv-7");
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"drv-7\"");
    let back: DriverId = serde_json::from_str("\"drv-7\"").unwrap();
    assert_eq!(back, id);
}

#[test]
fn test_offer_ids_are_unique() {
    assert_ne!(OfferId::generate(), OfferId::generate());
}

#[test]
fn test_job_kind_names() {
    assert_eq!(JobKind::Route.to_string(), "route");
    assert_eq!(serde_json::to_string(&JobKind::Task).unwrap(), "\"task\"");
}

#[test]
fn test_manual_clock_is_shared() {
    let start = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
    let clock = std::sync::Arc::new(ManualClock::new(start));
    let other = clock.clone();
    other.advance(Duration::minutes(90));
    assert_eq!(clock.now(), start + Duration::minutes(90));
}

#[test]
fn test_init_tracing_is_idempotent() {
    prometheus_dispatch::util::telemetry::init_tracing();
    prometheus_dispatch::util::telemetry::init_tracing();
    tracing::info!("tracing initialized");
}
