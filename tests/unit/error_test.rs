//! Tests for error types

use prometheus_dispatch::core::{DispatchError, JobStatus, NotifyError, TokenError};
use prometheus_dispatch::util::serde::{DriverId, JobId};

#[test]
fn test_job_not_found_error() {
    let err = DispatchError::JobNotFound(JobId::new("j-9"));
    assert_eq!(format!("{}", err), "job not found: j-9");
}

#[test]
fn test_already_offered_error() {
    let err = DispatchError::AlreadyOffered(JobId::new("j-1"));
    assert_eq!(format!("{}", err), "job j-1 already has an outstanding offer");
}

#[test]
fn test_ineligible_error() {
    let err = DispatchError::Ineligible {
        driver: DriverId::new("d-3"),
        reason: "no contact handle".into(),
    };
    assert_eq!(format!("{}", err), "driver d-3 is ineligible: no contact handle");
}

#[test]
fn test_token_error_converts() {
    let err: DispatchError = TokenError::BadSignature.into();
    assert_eq!(format!("{}", err), "token error: token signature mismatch");
}

#[test]
fn test_backend_error() {
    let err = DispatchError::Backend("connection failed".to_string());
    assert_eq!(format!("{}", err), "backend error: connection failed");
}

#[test]
fn test_notify_error() {
    let err = NotifyError("sms gateway timeout".into());
    assert_eq!(format!("{}", err), "notification failed: sms gateway timeout");
}

#[test]
fn test_not_open_error() {
    let err = DispatchError::NotOpen {
        job: JobId::new("j-2"),
        status: JobStatus::Accepted,
    };
    assert_eq!(format!("{}", err), "job j-2 is no longer awaiting an offer (Accepted)");
}

#[test]
fn test_out_of_range_error() {
    let err = DispatchError::OutOfRange {
        job: JobId::new("j-4"),
        what: "part start",
    };
    assert_eq!(format!("{}", err), "time out of range for job j-4: part start");
}

#[test]
fn test_contended_error() {
    let err = DispatchError::Contended(JobId::new("j-5"));
    assert_eq!(format!("{}", err), "job j-5 changed repeatedly during acceptance");
}
