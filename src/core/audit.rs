//! Dispatch audit trail.
//!
//! Every committed transition is recorded so operators can reconstruct why a
//! job ended up with a particular driver (or with none).

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::serde::{DriverId, JobId, OfferId};

/// Kind of committed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Offer issued to a driver.
    OfferSent,
    /// Driver accepted; booking created.
    OfferAccepted,
    /// Driver declined.
    OfferDeclined,
    /// Sweeper expired an offer.
    OfferExpired,
    /// Candidates exhausted; admin alerted.
    JobEscalated,
    /// Booking removed by driver cancellation or reschedule conflict.
    BookingReleased,
    /// Booking window moved in place after a schedule edit.
    BookingRescheduled,
    /// Operator barred a driver from a job before any offer.
    DriverExcluded,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OfferSent => "offer_sent",
            Self::OfferAccepted => "offer_accepted",
            Self::OfferDeclined => "offer_declined",
            Self::OfferExpired => "offer_expired",
            Self::JobEscalated => "job_escalated",
            Self::BookingReleased => "booking_released",
            Self::BookingRescheduled => "booking_rescheduled",
            Self::DriverExcluded => "driver_excluded",
        };
        f.write_str(s)
    }
}

/// Audit event structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: Uuid,
    /// Related job.
    pub job_id: JobId,
    /// Related offer, when the event concerns one.
    pub offer_id: Option<OfferId>,
    /// Related driver, when the event concerns one.
    pub driver_id: Option<DriverId>,
    /// Transition recorded.
    pub action: AuditAction,
    /// When the transition committed.
    pub created_at: DateTime<Utc>,
    /// Additional context.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev.
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events.min(1024)),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Shared sink: lets the caller keep a handle for inspection while the engine
/// owns a boxed clone.
impl<S: AuditSink> AuditSink for std::sync::Arc<parking_lot::Mutex<S>> {
    fn record(&mut self, event: AuditEvent) {
        self.lock().record(event);
    }
}

/// Helper to build an audit event.
pub fn build_audit_event(
    job_id: &JobId,
    offer_id: Option<OfferId>,
    driver_id: Option<&DriverId>,
    action: AuditAction,
    created_at: DateTime<Utc>,
    detail: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: Uuid::new_v4(),
        job_id: job_id.clone(),
        offer_id,
        driver_id: driver_id.cloned(),
        action,
        created_at,
        detail,
    }
}
