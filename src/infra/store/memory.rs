//! In-memory dispatch store.
//!
//! All state sits behind one mutex, so every trait method is a single atomic
//! step: conditions are checked and writes applied under the same lock.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::core::error::DispatchError;
use crate::core::model::{Booking, ExclusionList, Job, JobStatus, Offer, OfferStatus};
use crate::core::ports::{
    AcceptOutcome, BookingUpdate, DeadlineGuard, DispatchStore, IssueOutcome, OfferTransition,
};
use crate::core::window::{overlap, TimeWindow};
use crate::util::serde::{DriverId, JobId, OfferId};

#[derive(Default)]
struct State {
    jobs: HashMap<JobId, Job>,
    offers: HashMap<OfferId, Offer>,
    /// Offer ids per job in issue order.
    offers_by_job: HashMap<JobId, Vec<OfferId>>,
    exclusions: HashMap<JobId, ExclusionList>,
    bookings: HashMap<JobId, Booking>,
}

impl State {
    fn has_sent_offer(&self, job: &JobId) -> bool {
        self.offers_by_job.get(job).is_some_and(|ids| {
            ids.iter()
                .filter_map(|id| self.offers.get(id))
                .any(|o| o.status == OfferStatus::Sent)
        })
    }

    fn driver_conflict(&self, driver: &DriverId, job: &JobId, window: &TimeWindow) -> Option<&Booking> {
        self.bookings
            .values()
            .find(|b| b.driver_id == *driver && b.job_id != *job && overlap(&b.window, window))
    }
}

/// Store keeping jobs, offers, exclusions and bookings in process memory.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    faults: Mutex<Vec<&'static str>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every offer ever issued for a job, oldest first.
    pub fn offers_for_job(&self, job: &JobId) -> Vec<Offer> {
        let state = self.state.lock();
        state
            .offers_by_job
            .get(job)
            .map(|ids| ids.iter().filter_map(|id| state.offers.get(id)).cloned().collect())
            .unwrap_or_default()
    }

    /// Record a booking made outside the engine, e.g. by an import.
    pub fn seed_booking(&self, booking: Booking) {
        self.state.lock().bookings.insert(booking.job_id.clone(), booking);
    }

    /// Snapshot of all bookings.
    pub fn bookings(&self) -> Vec<Booking> {
        self.state.lock().bookings.values().cloned().collect()
    }

    /// Make the next call to the trait method named `method` fail with a
    /// backend error, as if the store were unreachable.
    pub fn fail_next(&self, method: &'static str) {
        self.faults.lock().push(method);
    }

    fn injected(&self, method: &str) -> Result<(), DispatchError> {
        let mut faults = self.faults.lock();
        match faults.iter().position(|m| *m == method) {
            Some(pos) => {
                faults.remove(pos);
                Err(DispatchError::Backend(format!("{method}: store unreachable")))
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DispatchStore for InMemoryStore {
    async fn insert_job(&self, job: Job) -> Result<(), DispatchError> {
        self.injected("insert_job")?;
        self.state.lock().jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn job(&self, id: &JobId) -> Result<Option<Job>, DispatchError> {
        self.injected("job")?;
        Ok(self.state.lock().jobs.get(id).cloned())
    }

    async fn jobs_with_status(&self, status: JobStatus) -> Result<Vec<Job>, DispatchError> {
        self.injected("jobs_with_status")?;
        let state = self.state.lock();
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(jobs)
    }

    async fn jobs_in_group(&self, group: &JobId) -> Result<Vec<Job>, DispatchError> {
        self.injected("jobs_in_group")?;
        let state = self.state.lock();
        let mut parts: Vec<Job> = state
            .jobs
            .values()
            .filter(|j| j.group.as_ref() == Some(group))
            .cloned()
            .collect();
        parts.sort_by_key(|j| j.unit_index);
        Ok(parts)
    }

    async fn transition_job(
        &self,
        id: &JobId,
        from: &[JobStatus],
        to: JobStatus,
    ) -> Result<bool, DispatchError> {
        self.injected("transition_job")?;
        let mut state = self.state.lock();
        match state.jobs.get_mut(id) {
            Some(job) if from.contains(&job.status) => {
                job.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_job_schedule(
        &self,
        id: &JobId,
        scheduled_start: DateTime<Utc>,
    ) -> Result<Option<Job>, DispatchError> {
        self.injected("update_job_schedule")?;
        let mut state = self.state.lock();
        Ok(state.jobs.get_mut(id).map(|job| {
            job.scheduled_start = scheduled_start;
            job.clone()
        }))
    }

    async fn issue_offer(&self, offer: Offer) -> Result<IssueOutcome, DispatchError> {
        self.injected("issue_offer")?;
        let mut state = self.state.lock();
        let Some(status) = state.jobs.get(&offer.job_id).map(|j| j.status) else {
            return Ok(IssueOutcome::JobMissing);
        };
        if !matches!(status, JobStatus::Unassigned | JobStatus::OfferPending) {
            return Ok(IssueOutcome::JobNotOpen(status));
        }
        if state
            .exclusions
            .get(&offer.job_id)
            .is_some_and(|list| list.contains(&offer.driver_id))
        {
            return Ok(IssueOutcome::Excluded);
        }
        if state.has_sent_offer(&offer.job_id) {
            return Ok(IssueOutcome::AlreadyOffered);
        }

        if let Some(job) = state.jobs.get_mut(&offer.job_id) {
            job.status = JobStatus::Offered;
        }
        state
            .offers_by_job
            .entry(offer.job_id.clone())
            .or_default()
            .push(offer.id);
        state.offers.insert(offer.id, offer.clone());
        Ok(IssueOutcome::Issued(offer))
    }

    async fn offer(&self, id: &OfferId) -> Result<Option<Offer>, DispatchError> {
        self.injected("offer")?;
        Ok(self.state.lock().offers.get(id).cloned())
    }

    async fn latest_offer(&self, job: &JobId) -> Result<Option<Offer>, DispatchError> {
        self.injected("latest_offer")?;
        let state = self.state.lock();
        Ok(state
            .offers_by_job
            .get(job)
            .and_then(|ids| ids.last())
            .and_then(|id| state.offers.get(id))
            .cloned())
    }

    async fn sent_offers_for_driver(&self, driver: &DriverId) -> Result<Vec<Offer>, DispatchError> {
        self.injected("sent_offers_for_driver")?;
        let state = self.state.lock();
        let mut offers: Vec<Offer> = state
            .offers
            .values()
            .filter(|o| o.driver_id == *driver && o.status == OfferStatus::Sent)
            .cloned()
            .collect();
        offers.sort_by_key(|o| o.issued_at);
        Ok(offers)
    }

    async fn stale_offers(&self, now: DateTime<Utc>) -> Result<Vec<Offer>, DispatchError> {
        self.injected("stale_offers")?;
        let state = self.state.lock();
        let mut offers: Vec<Offer> = state
            .offers
            .values()
            .filter(|o| o.status == OfferStatus::Sent && o.is_past_deadline(now))
            .cloned()
            .collect();
        offers.sort_by_key(|o| o.expires_at);
        Ok(offers)
    }

    async fn close_offer(
        &self,
        id: &OfferId,
        to: OfferStatus,
        guard: DeadlineGuard,
    ) -> Result<OfferTransition, DispatchError> {
        self.injected("close_offer")?;
        let mut state = self.state.lock();
        let Some(offer) = state.offers.get_mut(id) else {
            return Ok(OfferTransition::Missing);
        };
        if offer.status != OfferStatus::Sent || !guard.admits(offer) {
            return Ok(OfferTransition::Rejected(offer.clone()));
        }
        offer.status = to;
        let closed = offer.clone();

        state
            .exclusions
            .entry(closed.job_id.clone())
            .or_default()
            .insert(closed.driver_id.clone());
        if let Some(job) = state.jobs.get_mut(&closed.job_id) {
            if job.status == JobStatus::Offered {
                job.status = JobStatus::OfferPending;
            }
        }
        Ok(OfferTransition::Applied(closed))
    }

    async fn accept_offer(
        &self,
        id: &OfferId,
        now: DateTime<Utc>,
        scheduled_start: DateTime<Utc>,
        booking: Booking,
    ) -> Result<AcceptOutcome, DispatchError> {
        self.injected("accept_offer")?;
        let mut state = self.state.lock();
        let Some(offer) = state.offers.get(id) else {
            return Ok(AcceptOutcome::NotFound);
        };
        match offer.status {
            OfferStatus::Sent => {}
            OfferStatus::Accepted => return Ok(AcceptOutcome::AlreadyAccepted),
            OfferStatus::Expired => return Ok(AcceptOutcome::Expired),
            OfferStatus::Declined => return Ok(AcceptOutcome::NotSent),
        }
        if offer.is_past_deadline(now) {
            return Ok(AcceptOutcome::Expired);
        }
        let job_id = offer.job_id.clone();
        match state.jobs.get(&job_id) {
            None => return Ok(AcceptOutcome::NotFound),
            Some(job) if job.scheduled_start != scheduled_start => {
                return Ok(AcceptOutcome::Rescheduled);
            }
            Some(_) => {}
        }
        if state.bookings.contains_key(&job_id) {
            return Ok(AcceptOutcome::AlreadyAccepted);
        }
        if let Some(existing) = state.driver_conflict(&booking.driver_id, &job_id, &booking.window) {
            return Ok(AcceptOutcome::Conflict(existing.clone()));
        }

        if let Some(offer) = state.offers.get_mut(id) {
            offer.status = OfferStatus::Accepted;
        }
        if let Some(job) = state.jobs.get_mut(&job_id) {
            job.status = JobStatus::Accepted;
        }
        state.bookings.insert(job_id, booking.clone());
        Ok(AcceptOutcome::Accepted(booking))
    }

    async fn exclusions(&self, job: &JobId) -> Result<ExclusionList, DispatchError> {
        self.injected("exclusions")?;
        Ok(self
            .state
            .lock()
            .exclusions
            .get(job)
            .cloned()
            .unwrap_or_default())
    }

    async fn exclude(&self, job: &JobId, driver: &DriverId) -> Result<ExclusionList, DispatchError> {
        self.injected("exclude")?;
        let mut state = self.state.lock();
        let list = state.exclusions.entry(job.clone()).or_default();
        list.insert(driver.clone());
        Ok(list.clone())
    }

    async fn booking_for_job(&self, job: &JobId) -> Result<Option<Booking>, DispatchError> {
        self.injected("booking_for_job")?;
        Ok(self.state.lock().bookings.get(job).cloned())
    }

    async fn bookings_for_driver(
        &self,
        driver: &DriverId,
        range: TimeWindow,
    ) -> Result<Vec<Booking>, DispatchError> {
        self.injected("bookings_for_driver")?;
        let state = self.state.lock();
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.driver_id == *driver && overlap(&b.window, &range))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.window.start);
        Ok(bookings)
    }

    async fn release_booking(
        &self,
        job: &JobId,
        driver: &DriverId,
        exclude: bool,
    ) -> Result<Option<Booking>, DispatchError> {
        self.injected("release_booking")?;
        let mut state = self.state.lock();
        if !state.bookings.get(job).is_some_and(|b| b.driver_id == *driver) {
            return Ok(None);
        }
        let released = state.bookings.remove(job);
        if exclude {
            state
                .exclusions
                .entry(job.clone())
                .or_default()
                .insert(driver.clone());
        }
        if let Some(j) = state.jobs.get_mut(job) {
            if j.status == JobStatus::Accepted {
                j.status = JobStatus::Unassigned;
            }
        }
        Ok(released)
    }

    async fn update_booking_window(
        &self,
        job: &JobId,
        driver: &DriverId,
        window: TimeWindow,
    ) -> Result<BookingUpdate, DispatchError> {
        self.injected("update_booking_window")?;
        let mut state = self.state.lock();
        if !state.bookings.get(job).is_some_and(|b| b.driver_id == *driver) {
            return Ok(BookingUpdate::Missing);
        }
        if let Some(other) = state.driver_conflict(driver, job, &window) {
            return Ok(BookingUpdate::Conflict(other.clone()));
        }
        match state.bookings.get_mut(job) {
            Some(booking) => {
                booking.window = window;
                Ok(BookingUpdate::Updated(booking.clone()))
            }
            None => Ok(BookingUpdate::Missing),
        }
    }
}
