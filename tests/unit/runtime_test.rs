//! Tests for the API surface

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use prometheus_dispatch::builders::EngineBuilder;
use prometheus_dispatch::config::DispatchConfig;
use prometheus_dispatch::core::{DispatchStore, Job, OfferAction, ResponseCode};
use prometheus_dispatch::infra::InMemoryStore;
use prometheus_dispatch::runtime::api::{self, CascadeSummary, DispatchRequest, DispatchResponse};
use prometheus_dispatch::util::clock::ManualClock;
use prometheus_dispatch::util::serde::{JobId, JobKind};

#[test]
fn test_health() {
    assert!(api::health().ok);
}

#[test]
fn test_request_json_shape() {
    let req: DispatchRequest =
        serde_json::from_str(r#"{"type":"respond","token":"abc.def","action":"decline"}"#).unwrap();
    assert_eq!(
        req,
        DispatchRequest::Respond {
            token: "abc.def".into(),
            action: OfferAction::Decline,
        }
    );

    let req: DispatchRequest = serde_json::from_str(
        r#"{"type":"reschedule","job_id":"j1","new_start":"2025-03-04T12:00:00Z"}"#,
    )
    .unwrap();
    assert!(matches!(req, DispatchRequest::Reschedule { reconfirmed: false, .. }));

    let req: DispatchRequest = serde_json::from_str(r#"{"type":"sweep"}"#).unwrap();
    assert_eq!(req, DispatchRequest::Sweep);
}

#[test]
fn test_response_code_serializes_screaming_snake() {
    let json = serde_json::to_string(&ResponseCode::AlreadyAccepted).unwrap();
    assert_eq!(json, "\"ALREADY_ACCEPTED\"");
}

#[tokio::test]
async fn test_handle_routes_requests() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 3, 8, 0, 0).unwrap(),
    ));
    let engine = EngineBuilder::new(DispatchConfig::new("0123456789abcdef0123", "https://x.test/o"))
        .with_store(store.clone())
        .with_clock(clock)
        .build()
        .unwrap();
    let start = Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap();
    store
        .insert_job(Job::new("j1", JobKind::Task, "cleaning", start))
        .await
        .unwrap();

    let res = api::handle(&engine, DispatchRequest::Health).await;
    assert!(matches!(res, DispatchResponse::Health(ref h) if h.ok));

    let res = api::handle(
        &engine,
        DispatchRequest::CreateOffer {
            job_id: JobId::new("j1"),
        },
    )
    .await;
    assert!(matches!(
        res,
        DispatchResponse::CreateOffer(CascadeSummary::Escalated { .. })
    ));

    let res = api::handle(
        &engine,
        DispatchRequest::Respond {
            token: "bogus".into(),
            action: OfferAction::Accept,
        },
    )
    .await;
    let DispatchResponse::Respond(body) = res else {
        panic!("unexpected response {res:?}");
    };
    assert_eq!(body.code, ResponseCode::InvalidToken);

    let res = api::handle(
        &engine,
        DispatchRequest::CreateOffer {
            job_id: JobId::new("missing"),
        },
    )
    .await;
    assert!(matches!(res, DispatchResponse::Error { ref message } if message.contains("missing")));

    let res = api::handle(&engine, DispatchRequest::Sweep).await;
    let json = serde_json::to_value(&res).unwrap();
    assert_eq!(json["type"], "sweep");
    assert_eq!(json["body"]["expired"], 0);
}
