//! Reassignment after a booking is cancelled or a job is rescheduled.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::core::audit::AuditAction;
use crate::core::availability::{AvailabilityIndex, ConflictSource};
use crate::core::cascade::{CascadeController, CascadeOutcome};
use crate::core::context::DispatchContext;
use crate::core::error::DispatchError;
use crate::core::model::{Booking, Job, JobStatus};
use crate::core::ports::BookingUpdate;
use crate::util::serde::{DriverId, JobId};

/// Result of a driver cancellation.
#[derive(Debug, Clone, Default)]
pub struct CancelReport {
    /// Bookings that were released.
    pub released: Vec<Booking>,
    /// Cascade result per released job.
    pub cascades: Vec<(JobId, CascadeOutcome)>,
}

impl CancelReport {
    /// Whether anything was cancelled.
    pub fn is_empty(&self) -> bool {
        self.released.is_empty()
    }
}

/// Result of a schedule edit.
#[derive(Debug, Clone)]
pub enum RescheduleOutcome {
    /// The job had no booking; only its schedule changed.
    Unbooked(Job),
    /// The booked driver is still free; the booking window moved in place.
    Kept(Booking),
    /// The booked driver conflicts at the new time; the booking was released.
    Released {
        /// The released booking.
        booking: Booking,
        /// Whether the driver was added to the exclusion list.
        excluded: bool,
        /// Cascade result for the job.
        cascade: CascadeOutcome,
    },
}

/// Handles booking cancellations and schedule edits.
pub struct ReassignmentTrigger {
    ctx: DispatchContext,
    availability: AvailabilityIndex,
    cascade: Arc<CascadeController>,
}

impl ReassignmentTrigger {
    /// Create the trigger.
    pub fn new(ctx: DispatchContext, cascade: Arc<CascadeController>) -> Self {
        Self {
            availability: AvailabilityIndex::new(ctx.clone()),
            ctx,
            cascade,
        }
    }

    /// Driver `driver_id` cancels their booking of `job_id`.
    ///
    /// For multi-part jobs every part booked to that driver is released;
    /// parts held by other drivers are left alone. The driver is excluded from
    /// each released part and the part re-enters the cascade.
    pub async fn cancel_booking(
        &self,
        job_id: &JobId,
        driver_id: &DriverId,
        reason: &str,
    ) -> Result<CancelReport, DispatchError> {
        let job = self
            .ctx
            .store
            .job(job_id)
            .await?
            .ok_or_else(|| DispatchError::JobNotFound(job_id.clone()))?;
        let parts = match &job.group {
            Some(group) => self.ctx.store.jobs_in_group(group).await?,
            None => vec![job],
        };

        let mut report = CancelReport::default();
        for part in parts {
            let Some(booking) = self
                .ctx
                .store
                .release_booking(&part.id, driver_id, true)
                .await?
            else {
                continue;
            };
            self.ctx.record(
                &part.id,
                None,
                Some(driver_id),
                AuditAction::BookingReleased,
                Some(format!("cancelled by driver: {reason}")),
            );
            info!("driver {} cancelled job {}: {}", driver_id, part.id, reason);
            report.released.push(booking);

            let outcome = self.restart(&part.id).await?;
            report.cascades.push((part.id.clone(), outcome));
        }

        if report.is_empty() {
            warn!("driver {} holds no booking for job {}", driver_id, job_id);
        }
        Ok(report)
    }

    /// The job's schedule moved to `new_start`.
    ///
    /// A booked driver who is still free keeps the job with an updated window.
    /// Otherwise the booking is released and the job re-enters the cascade;
    /// the driver is excluded unless they reconfirmed.
    pub async fn reschedule_job(
        &self,
        job_id: &JobId,
        new_start: DateTime<Utc>,
        reconfirmed: bool,
    ) -> Result<RescheduleOutcome, DispatchError> {
        let store = &self.ctx.store;
        let current = store
            .job(job_id)
            .await?
            .ok_or_else(|| DispatchError::JobNotFound(job_id.clone()))?;
        self.ctx.job_window(&Job {
            scheduled_start: new_start,
            ..current
        })?;
        let job = store
            .update_job_schedule(job_id, new_start)
            .await?
            .ok_or_else(|| DispatchError::JobNotFound(job_id.clone()))?;
        let Some(booking) = store.booking_for_job(job_id).await? else {
            info!("job {} rescheduled to {} (no booking)", job_id, new_start);
            return Ok(RescheduleOutcome::Unbooked(job));
        };

        let window = self.ctx.job_window(&job)?;
        let conflict = self
            .availability
            .find_conflict(&booking.driver_id, job_id, &window)
            .await?;

        match conflict {
            None => match store
                .update_booking_window(job_id, &booking.driver_id, window)
                .await?
            {
                BookingUpdate::Updated(updated) => {
                    self.ctx.record(
                        job_id,
                        None,
                        Some(&updated.driver_id),
                        AuditAction::BookingRescheduled,
                        Some(format!("{}..{}", window.start, window.end)),
                    );
                    info!(
                        "job {} rescheduled; driver {} keeps it",
                        job_id, updated.driver_id
                    );
                    return Ok(RescheduleOutcome::Kept(updated));
                }
                BookingUpdate::Conflict(other) => {
                    warn!(
                        "driver {} picked up overlapping job {} during reschedule of {}",
                        booking.driver_id, other.job_id, job_id
                    );
                }
                BookingUpdate::Missing => {
                    let job = store.job(job_id).await?.unwrap_or(job);
                    return Ok(RescheduleOutcome::Unbooked(job));
                }
            },
            Some(ConflictSource::Booking(other)) => {
                info!(
                    "job {} moved onto driver {}'s booking for job {}",
                    job_id, booking.driver_id, other.job_id
                );
            }
            Some(ConflictSource::Reservation(_)) => {
                info!(
                    "job {} moved onto a reservation of driver {}",
                    job_id, booking.driver_id
                );
            }
        }

        let excluded = !reconfirmed;
        let Some(released) = store
            .release_booking(job_id, &booking.driver_id, excluded)
            .await?
        else {
            let job = store.job(job_id).await?.unwrap_or(job);
            return Ok(RescheduleOutcome::Unbooked(job));
        };
        self.ctx.record(
            job_id,
            None,
            Some(&released.driver_id),
            AuditAction::BookingReleased,
            Some("schedule conflict after reschedule".into()),
        );

        let cascade = self.restart(job_id).await?;
        Ok(RescheduleOutcome::Released {
            booking: released,
            excluded,
            cascade,
        })
    }

    async fn restart(&self, job_id: &JobId) -> Result<CascadeOutcome, DispatchError> {
        let moved = self
            .ctx
            .store
            .transition_job(job_id, &[JobStatus::Unassigned], JobStatus::OfferPending)
            .await?;
        if !moved {
            let status = self
                .ctx
                .store
                .job(job_id)
                .await?
                .map_or(JobStatus::Unassigned, |j| j.status);
            return Ok(CascadeOutcome::Settled(status));
        }
        self.cascade.run(job_id).await
    }
}
