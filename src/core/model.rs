//! Dispatch domain records: drivers, jobs, offers, bookings.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::core::window::TimeWindow;
use crate::util::serde::{Capability, ContactHandle, DriverId, JobId, JobKind, OfferId, OrgId};

/// One recurring weekly availability slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySlot {
    /// Day of week in business-local time.
    pub day: Weekday,
    /// Slot start (inclusive), local time of day.
    pub start: NaiveTime,
    /// Slot end (exclusive), local time of day.
    pub end: NaiveTime,
    /// Blocked slots mark the whole day unavailable.
    #[serde(default)]
    pub blocked: bool,
}

impl WeeklySlot {
    /// An open slot.
    pub const fn open(day: Weekday, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            day,
            start,
            end,
            blocked: false,
        }
    }

    /// Whether this open slot covers `time` on `day`.
    pub fn covers(&self, day: Weekday, time: NaiveTime) -> bool {
        !self.blocked && self.day == day && self.start <= time && time < self.end
    }

    /// Slot length in hours; zero for blocked or inverted slots.
    pub fn hours(&self) -> f64 {
        if self.blocked || self.end <= self.start {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let minutes = (self.end - self.start).num_minutes() as f64;
        minutes / 60.0
    }
}

/// Rolling performance stats used for ranking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriverStats {
    /// Average rating, typically 0.0 to 5.0.
    pub rating: f64,
    /// Lifetime completed jobs.
    pub completed_jobs: u32,
    /// Jobs completed in the recent window.
    pub recent_jobs: u32,
}

/// An independent contractor who can be offered jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    /// Driver identifier.
    pub id: DriverId,
    /// Service types and teams this driver belongs to.
    pub capabilities: BTreeSet<Capability>,
    /// Organizations the driver is affiliated with.
    #[serde(default)]
    pub organizations: BTreeSet<OrgId>,
    /// How to reach the driver; drivers without one are never offered work.
    pub contact: Option<ContactHandle>,
    /// Passed onboarding.
    pub approved: bool,
    /// Currently taking work.
    pub active: bool,
    /// Recurring weekly availability.
    #[serde(default)]
    pub weekly: Vec<WeeklySlot>,
    /// Performance stats.
    #[serde(default)]
    pub stats: DriverStats,
}

impl Driver {
    /// Whether the driver can be contacted and is cleared for work.
    pub const fn is_dispatchable(&self) -> bool {
        self.approved && self.active && self.contact.is_some()
    }

    /// Whether the weekly schedule admits work at `time` on `day`.
    pub fn available_at(&self, day: Weekday, time: NaiveTime) -> bool {
        let blocked_day = self.weekly.iter().any(|s| s.blocked && s.day == day);
        !blocked_day && self.weekly.iter().any(|s| s.covers(day, time))
    }

    /// Total open hours across the weekly schedule.
    pub fn weekly_hours(&self) -> f64 {
        self.weekly.iter().map(WeeklySlot::hours).sum()
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// No offer in flight.
    Unassigned,
    /// The engine is selecting the next candidate.
    OfferPending,
    /// An offer is out to a driver.
    Offered,
    /// A booking exists.
    Accepted,
    /// Candidates exhausted; escalated for manual resolution.
    ExpiredNoCandidates,
}

/// A schedulable unit of work requiring one driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Job identifier.
    pub id: JobId,
    /// Task or route.
    pub kind: JobKind,
    /// Shared by every part of a multi-part job.
    #[serde(default)]
    pub group: Option<JobId>,
    /// 1-based part index within the group.
    #[serde(default = "first_unit")]
    pub unit_index: u32,
    /// Capability or team required.
    pub capability: Capability,
    /// Organization scheduling its own affiliated drivers.
    #[serde(default)]
    pub sponsor: Option<OrgId>,
    /// Scheduled start of the first part.
    pub scheduled_start: DateTime<Utc>,
    /// Free-form location context for escalations.
    #[serde(default)]
    pub location: Option<String>,
    /// Current status.
    pub status: JobStatus,
}

const fn first_unit() -> u32 {
    1
}

impl Job {
    /// New unassigned single-part job.
    pub fn new(
        id: impl Into<JobId>,
        kind: JobKind,
        capability: impl Into<Capability>,
        scheduled_start: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            group: None,
            unit_index: 1,
            capability: capability.into(),
            sponsor: None,
            scheduled_start,
            location: None,
            status: JobStatus::Unassigned,
        }
    }

    /// Mark this job as part `unit_index` of `group`.
    #[must_use]
    pub fn part_of(mut self, group: impl Into<JobId>, unit_index: u32) -> Self {
        self.group = Some(group.into());
        self.unit_index = unit_index;
        self
    }

    /// Restrict the candidate pool to a sponsoring organization.
    #[must_use]
    pub fn sponsored_by(mut self, org: impl Into<OrgId>) -> Self {
        self.sponsor = Some(org.into());
        self
    }

    /// Attach location context.
    #[must_use]
    pub fn at_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Offer lifecycle state. Transitions only leave `Sent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    /// Awaiting a response.
    Sent,
    /// Driver accepted; a booking exists.
    Accepted,
    /// Driver declined.
    Declined,
    /// Deadline passed without a response.
    Expired,
}

/// Time-limited invitation to a single driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    /// Offer identifier.
    pub id: OfferId,
    /// Job being offered.
    pub job_id: JobId,
    /// Candidate driver.
    pub driver_id: DriverId,
    /// When the offer was issued.
    pub issued_at: DateTime<Utc>,
    /// Response deadline.
    pub expires_at: DateTime<Utc>,
    /// Current status.
    pub status: OfferStatus,
    /// Drivers already excluded for the job when this offer went out.
    #[serde(default)]
    pub excluded: Vec<DriverId>,
}

impl Offer {
    /// Whether the deadline has passed at `now`.
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A confirmed driver-job pairing with its own window snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booked job.
    pub job_id: JobId,
    /// Booked driver.
    pub driver_id: DriverId,
    /// Blocked window locked at booking time.
    pub window: TimeWindow,
    /// When the booking was created.
    pub booked_at: DateTime<Utc>,
}

/// Formal time-slot reservation held by a driver outside this engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reserving driver.
    pub driver_id: DriverId,
    /// Reserved blocked window.
    pub window: TimeWindow,
    /// Job the reservation belongs to, if any.
    #[serde(default)]
    pub job_id: Option<JobId>,
}

/// Drivers no longer eligible for a job. Only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionList(BTreeSet<DriverId>);

impl ExclusionList {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a driver; returns true if newly added.
    pub fn insert(&mut self, driver: DriverId) -> bool {
        self.0.insert(driver)
    }

    /// Whether the driver is excluded.
    pub fn contains(&self, driver: &DriverId) -> bool {
        self.0.contains(driver)
    }

    /// Number of excluded drivers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nobody is excluded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Excluded drivers in id order.
    pub fn iter(&self) -> impl Iterator<Item = &DriverId> {
        self.0.iter()
    }

    /// Whether every driver in `other` is also in `self`.
    pub fn is_superset(&self, other: &Self) -> bool {
        self.0.is_superset(&other.0)
    }

    /// Snapshot as an ordered vector.
    pub fn to_vec(&self) -> Vec<DriverId> {
        self.0.iter().cloned().collect()
    }
}

impl FromIterator<DriverId> for ExclusionList {
    fn from_iter<I: IntoIterator<Item = DriverId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
