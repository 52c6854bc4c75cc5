//! Collaborator abstractions consumed by the engine.
//!
//! Every mutation of shared dispatch state goes through a conditional
//! operation on [`DispatchStore`]; no store method is allowed to read and then
//! write without re-checking the expected state inside the same atomic step.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::{DispatchError, NotifyError};
use crate::core::model::{
    Booking, Driver, ExclusionList, Job, JobStatus, Offer, OfferStatus, Reservation,
};
use crate::core::window::TimeWindow;
use crate::util::serde::{Capability, ContactHandle, DriverId, JobId, JobKind, OfferId, OrgId};

/// Deadline condition attached to an offer transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineGuard {
    /// Apply regardless of the deadline.
    Any,
    /// Apply only if `now` is before the offer's deadline.
    Before(DateTime<Utc>),
    /// Apply only if the offer's deadline has passed at `now`.
    AtOrAfter(DateTime<Utc>),
}

impl DeadlineGuard {
    /// Whether `offer` satisfies this guard.
    pub fn admits(self, offer: &Offer) -> bool {
        match self {
            Self::Any => true,
            Self::Before(now) => now < offer.expires_at,
            Self::AtOrAfter(now) => now >= offer.expires_at,
        }
    }
}

/// Result of closing an offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferTransition {
    /// The transition was applied; carries the updated offer.
    Applied(Offer),
    /// The offer was not in the expected state or failed the deadline guard.
    Rejected(Offer),
    /// No such offer.
    Missing,
}

/// Result of conditionally issuing an offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOutcome {
    /// Offer stored as `sent` and the job moved to `offered`.
    Issued(Offer),
    /// Another `sent` offer exists for the job.
    AlreadyOffered,
    /// The driver is on the job's exclusion list.
    Excluded,
    /// The job is not awaiting a candidate.
    JobNotOpen(JobStatus),
    /// No such job.
    JobMissing,
}

/// Result of the atomic accept operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// Offer accepted, booking inserted, job accepted.
    Accepted(Booking),
    /// Offer deadline has passed.
    Expired,
    /// The offer (or another offer for the job) was already accepted.
    AlreadyAccepted,
    /// Offer is declined or expired.
    NotSent,
    /// No such offer.
    NotFound,
    /// The driver already holds an overlapping booking.
    Conflict(Booking),
    /// The job's schedule no longer matches the window the booking was built for.
    Rescheduled,
}

/// Result of a conditional booking window update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingUpdate {
    /// Window replaced in place.
    Updated(Booking),
    /// The new window overlaps another booking of the same driver.
    Conflict(Booking),
    /// No booking for the job held by the expected driver.
    Missing,
}

/// Persistence for jobs, offers, exclusions and bookings.
#[async_trait]
pub trait DispatchStore: Send + Sync {
    /// Insert or replace a job record. Used by the external booking collaborator.
    async fn insert_job(&self, job: Job) -> Result<(), DispatchError>;

    /// Load a job.
    async fn job(&self, id: &JobId) -> Result<Option<Job>, DispatchError>;

    /// Jobs currently in `status`.
    async fn jobs_with_status(&self, status: JobStatus) -> Result<Vec<Job>, DispatchError>;

    /// All parts of a multi-part job.
    async fn jobs_in_group(&self, group: &JobId) -> Result<Vec<Job>, DispatchError>;

    /// Move a job to `to` only if its status is one of `from`.
    async fn transition_job(
        &self,
        id: &JobId,
        from: &[JobStatus],
        to: JobStatus,
    ) -> Result<bool, DispatchError>;

    /// Replace a job's scheduled start. Returns the updated job.
    async fn update_job_schedule(
        &self,
        id: &JobId,
        scheduled_start: DateTime<Utc>,
    ) -> Result<Option<Job>, DispatchError>;

    /// Store `offer` as `sent` and move its job to `offered`, in one step.
    ///
    /// Applies only while the job is `unassigned` or `offer_pending`, the
    /// driver is not excluded and the job has no other `sent` offer.
    async fn issue_offer(&self, offer: Offer) -> Result<IssueOutcome, DispatchError>;

    /// Load an offer.
    async fn offer(&self, id: &OfferId) -> Result<Option<Offer>, DispatchError>;

    /// Most recently issued offer for a job.
    async fn latest_offer(&self, job: &JobId) -> Result<Option<Offer>, DispatchError>;

    /// Every `sent` offer addressed to a driver.
    async fn sent_offers_for_driver(&self, driver: &DriverId) -> Result<Vec<Offer>, DispatchError>;

    /// `sent` offers whose deadline has passed at `now`.
    async fn stale_offers(&self, now: DateTime<Utc>) -> Result<Vec<Offer>, DispatchError>;

    /// Close a `sent` offer as `to` (`declined` or `expired`) subject to
    /// `guard`. When applied, the driver joins the job's exclusion list and an
    /// `offered` job returns to `offer_pending` in the same step.
    async fn close_offer(
        &self,
        id: &OfferId,
        to: OfferStatus,
        guard: DeadlineGuard,
    ) -> Result<OfferTransition, DispatchError>;

    /// Atomically accept an offer: offer still `sent`, `now` before its
    /// deadline, job still scheduled at `scheduled_start`, no booking for the
    /// job, no overlapping booking for the driver. On success the offer is
    /// `accepted`, `booking` is stored and the job becomes `accepted`.
    async fn accept_offer(
        &self,
        id: &OfferId,
        now: DateTime<Utc>,
        scheduled_start: DateTime<Utc>,
        booking: Booking,
    ) -> Result<AcceptOutcome, DispatchError>;

    /// Exclusion list for a job.
    async fn exclusions(&self, job: &JobId) -> Result<ExclusionList, DispatchError>;

    /// Add a driver to a job's exclusion list and return the updated list.
    async fn exclude(&self, job: &JobId, driver: &DriverId) -> Result<ExclusionList, DispatchError>;

    /// Booking for a job.
    async fn booking_for_job(&self, job: &JobId) -> Result<Option<Booking>, DispatchError>;

    /// A driver's bookings whose window intersects `range`.
    async fn bookings_for_driver(
        &self,
        driver: &DriverId,
        range: TimeWindow,
    ) -> Result<Vec<Booking>, DispatchError>;

    /// Delete the job's booking if held by `driver`, moving the job from
    /// `accepted` back to `unassigned` in the same step. With `exclude` the
    /// driver is also added to the job's exclusion list.
    async fn release_booking(
        &self,
        job: &JobId,
        driver: &DriverId,
        exclude: bool,
    ) -> Result<Option<Booking>, DispatchError>;

    /// Replace the window of the job's booking held by `driver`, refusing if
    /// it would overlap another of the driver's bookings.
    async fn update_booking_window(
        &self,
        job: &JobId,
        driver: &DriverId,
        window: TimeWindow,
    ) -> Result<BookingUpdate, DispatchError>;
}

/// Read-only view of the driver pool.
#[async_trait]
pub trait DriverDirectory: Send + Sync {
    /// Drivers holding `capability`, limited to `sponsor`'s affiliates when set.
    async fn drivers_with_capability(
        &self,
        capability: &Capability,
        sponsor: Option<&OrgId>,
    ) -> Result<Vec<Driver>, DispatchError>;

    /// Look up a driver.
    async fn driver(&self, id: &DriverId) -> Result<Option<Driver>, DispatchError>;

    /// Look up a driver by contact handle (reply-by-phone flows).
    async fn driver_by_handle(&self, handle: &ContactHandle) -> Result<Option<Driver>, DispatchError>;

    /// A driver's formal reservations intersecting `range`.
    async fn reservations_between(
        &self,
        driver: &DriverId,
        range: TimeWindow,
    ) -> Result<Vec<Reservation>, DispatchError>;
}

/// Outbound driver messaging. No delivery guarantee.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Send `template` rendered with `variables` to `handle`.
    async fn send(
        &self,
        handle: &ContactHandle,
        template: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<(), NotifyError>;
}

/// Context attached to an escalation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertContext {
    /// Escalated job.
    pub job_id: JobId,
    /// Task or route.
    pub kind: JobKind,
    /// Required capability.
    pub capability: Capability,
    /// Base scheduled start.
    pub scheduled_start: DateTime<Utc>,
    /// Start of this part after stagger.
    pub part_start: DateTime<Utc>,
    /// Location context.
    pub location: Option<String>,
    /// Drivers excluded when candidates ran out.
    pub excluded: Vec<DriverId>,
    /// Human-readable reason.
    pub reason: String,
}

/// Administrative alert sink. Fire-and-forget.
#[async_trait]
pub trait AdminAlertSink: Send + Sync {
    /// Raise an alert for manual resolution.
    async fn notify(&self, alert: &AlertContext) -> Result<(), DispatchError>;
}

/// External dispatch/routing system informed after an assignment commits.
#[async_trait]
pub trait AssignmentSync: Send + Sync {
    /// Best-effort notification of a confirmed assignment.
    async fn assignment_confirmed(&self, job: &Job, booking: &Booking) -> Result<(), DispatchError>;
}
