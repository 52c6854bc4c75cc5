//! Driver eligibility for a job.
//!
//! A driver is eligible when they are cleared for work, hold the required
//! capability, are not excluded, are scheduled to work at the job's local
//! time (unless an organization sponsors the job), and neither a booking nor a
//! formal reservation on that calendar date overlaps the job's blocked window.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::context::DispatchContext;
use crate::core::error::DispatchError;
use crate::core::model::{Booking, Driver, ExclusionList, Job, Reservation};
use crate::core::window::{overlap, TimeWindow};
use crate::util::serde::{ContactHandle, DriverId, JobId};

/// Eligible driver with the metadata ranking needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Driver identifier.
    pub driver_id: DriverId,
    /// Where the offer will be sent.
    pub contact: Option<ContactHandle>,
    /// Average rating.
    pub rating: f64,
    /// Lifetime completed jobs.
    pub completed_jobs: u32,
    /// Recently completed jobs.
    pub recent_jobs: u32,
    /// Open hours per week.
    pub available_hours: f64,
}

impl Candidate {
    /// Ranking view of a driver.
    pub fn from_driver(driver: &Driver) -> Self {
        Self {
            driver_id: driver.id.clone(),
            contact: driver.contact.clone(),
            rating: driver.stats.rating,
            completed_jobs: driver.stats.completed_jobs,
            recent_jobs: driver.stats.recent_jobs,
            available_hours: driver.weekly_hours(),
        }
    }
}

/// What blocked a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictSource {
    /// A confirmed booking overlaps.
    Booking(Booking),
    /// A formal reservation overlaps.
    Reservation(Reservation),
}

/// Why a driver was filtered out before conflict checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    NotDispatchable,
    MissingCapability,
    NotAffiliated,
    Excluded,
    OffSchedule,
}

/// Computes the eligible driver set for a job.
#[derive(Clone)]
pub struct AvailabilityIndex {
    ctx: DispatchContext,
}

impl AvailabilityIndex {
    /// Create an index over the context's directory and store.
    pub const fn new(ctx: DispatchContext) -> Self {
        Self { ctx }
    }

    /// Drivers that could take `job` right now, in directory order.
    pub async fn eligible(
        &self,
        job: &Job,
        exclusions: &ExclusionList,
    ) -> Result<Vec<Candidate>, DispatchError> {
        let part_start = self.ctx.part_start(job)?;
        let window = self.ctx.job_window(job)?;
        let pool = self
            .ctx
            .directory
            .drivers_with_capability(&job.capability, job.sponsor.as_ref())
            .await?;

        let mut eligible = Vec::with_capacity(pool.len());
        for driver in pool {
            if let Err(reason) = self.screen(&driver, job, exclusions, part_start) {
                debug!(job = %job.id, driver = %driver.id, ?reason, "driver filtered");
                continue;
            }
            if let Some(conflict) = self.find_conflict(&driver.id, &job.id, &window).await? {
                debug!(job = %job.id, driver = %driver.id, ?conflict, "driver has a conflict");
                continue;
            }
            eligible.push(Candidate::from_driver(&driver));
        }

        debug!(
            "job {} has {} eligible drivers ({} excluded)",
            job.id,
            eligible.len(),
            exclusions.len()
        );
        Ok(eligible)
    }

    /// First booking or reservation of `driver` overlapping `window`, ignoring
    /// anything that belongs to `job_id` itself.
    pub async fn find_conflict(
        &self,
        driver: &DriverId,
        job_id: &JobId,
        window: &TimeWindow,
    ) -> Result<Option<ConflictSource>, DispatchError> {
        let range = self.lookup_range(window);

        let bookings = self.ctx.store.bookings_for_driver(driver, range).await?;
        if let Some(b) = bookings
            .into_iter()
            .find(|b| b.job_id != *job_id && overlap(&b.window, window))
        {
            return Ok(Some(ConflictSource::Booking(b)));
        }

        let reservations = self.ctx.directory.reservations_between(driver, range).await?;
        Ok(reservations
            .into_iter()
            .find(|r| r.job_id.as_ref() != Some(job_id) && overlap(&r.window, window))
            .map(ConflictSource::Reservation))
    }

    fn screen(
        &self,
        driver: &Driver,
        job: &Job,
        exclusions: &ExclusionList,
        part_start: DateTime<Utc>,
    ) -> Result<(), Rejection> {
        if !driver.is_dispatchable() {
            return Err(Rejection::NotDispatchable);
        }
        if !driver.capabilities.contains(&job.capability) {
            return Err(Rejection::MissingCapability);
        }
        if exclusions.contains(&driver.id) {
            return Err(Rejection::Excluded);
        }
        match &job.sponsor {
            Some(org) if !driver.organizations.contains(org) => Err(Rejection::NotAffiliated),
            Some(_) => Ok(()),
            None => {
                let local = part_start.with_timezone(&self.ctx.offset);
                if driver.available_at(local.weekday(), local.time()) {
                    Ok(())
                } else {
                    Err(Rejection::OffSchedule)
                }
            }
        }
    }

    /// The local calendar day containing the window start, widened to cover
    /// the whole window.
    fn lookup_range(&self, window: &TimeWindow) -> TimeWindow {
        let offset = self.ctx.offset;
        let local_midnight = window
            .start
            .with_timezone(&offset)
            .date_naive()
            .and_time(NaiveTime::MIN);
        let day_start = offset
            .from_local_datetime(&local_midnight)
            .single()
            .map_or(window.start, |d| d.with_timezone(&Utc));
        let day_end = day_start
            .checked_add_signed(Duration::days(1))
            .unwrap_or(window.end);
        TimeWindow::new(day_start, day_end).union(window)
    }
}
