//! Race-safe acceptance.
//!
//! Acceptance is one conditional store operation. Whatever happens afterwards
//! (external dispatch sync, logging) can fail without undoing it: the offer and
//! booking records are authoritative.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::core::audit::AuditAction;
use crate::core::context::DispatchContext;
use crate::core::error::DispatchError;
use crate::core::model::{Booking, Job, Offer, OfferStatus};
use crate::core::offer::{Resolution, ResponseCode};
use crate::core::ports::{AcceptOutcome, DeadlineGuard, OfferTransition};

/// Commit attempts before giving up on a job whose schedule keeps moving.
const MAX_ACCEPT_ATTEMPTS: usize = 3;

/// Guarantees a single winner among concurrent accepts for a job.
pub struct AtomicAcceptance {
    ctx: DispatchContext,
}

impl AtomicAcceptance {
    /// Create the acceptance guard.
    pub const fn new(ctx: DispatchContext) -> Self {
        Self { ctx }
    }

    /// Accept `offer` at `now`.
    ///
    /// The booking window is computed from the job as loaded; the store
    /// refuses the commit if the job was rescheduled in the meantime, and the
    /// window is recomputed.
    pub async fn accept(&self, offer: &Offer, now: DateTime<Utc>) -> Result<Resolution, DispatchError> {
        for attempt in 1..=MAX_ACCEPT_ATTEMPTS {
            let Some(job) = self.ctx.store.job(&offer.job_id).await? else {
                return Ok(Resolution::code(ResponseCode::NotFound));
            };
            let booking = Booking {
                job_id: job.id.clone(),
                driver_id: offer.driver_id.clone(),
                window: self.ctx.job_window(&job)?,
                booked_at: now,
            };

            let outcome = self
                .ctx
                .store
                .accept_offer(&offer.id, now, job.scheduled_start, booking)
                .await?;
            if outcome == AcceptOutcome::Rescheduled {
                debug!(
                    "job {} rescheduled while offer {} was accepted (attempt {})",
                    job.id, offer.id, attempt
                );
                continue;
            }
            return self.settle(offer, &job, outcome, now).await;
        }
        warn!("giving up accept of offer {}: job keeps moving", offer.id);
        Err(DispatchError::Contended(offer.job_id.clone()))
    }

    async fn settle(
        &self,
        offer: &Offer,
        job: &Job,
        outcome: AcceptOutcome,
        now: DateTime<Utc>,
    ) -> Result<Resolution, DispatchError> {
        let code = match outcome {
            AcceptOutcome::Accepted(booking) => {
                self.ctx.record(
                    &job.id,
                    Some(offer.id),
                    Some(&offer.driver_id),
                    AuditAction::OfferAccepted,
                    None,
                );
                info!(
                    "driver {} accepted offer {}; job {} booked {}..{}",
                    booking.driver_id, offer.id, job.id, booking.window.start, booking.window.end
                );
                self.after_commit(job, &booking).await;
                ResponseCode::Accepted
            }
            AcceptOutcome::Conflict(existing) => {
                return self.release_conflicted(offer, &existing, now).await;
            }
            AcceptOutcome::Expired => ResponseCode::Expired,
            AcceptOutcome::AlreadyAccepted => ResponseCode::AlreadyAccepted,
            AcceptOutcome::NotSent | AcceptOutcome::Rescheduled => ResponseCode::NotSent,
            AcceptOutcome::NotFound => ResponseCode::NotFound,
        };
        if code != ResponseCode::Accepted {
            warn!("accept of offer {} rejected: {}", offer.id, code);
        }
        Ok(Resolution::for_offer(code, offer))
    }

    /// Best-effort integration work. Failures are logged only.
    async fn after_commit(&self, job: &Job, booking: &Booking) {
        if let Some(sync) = &self.ctx.sync {
            if let Err(e) = sync.assignment_confirmed(job, booking).await {
                error!(
                    "assignment sync for job {} (driver {}) failed: {}",
                    job.id, booking.driver_id, e
                );
            }
        }
    }

    /// The driver took an overlapping booking after this offer went out: close
    /// the offer as declined and hand the job back to the cascade.
    async fn release_conflicted(
        &self,
        offer: &Offer,
        existing: &Booking,
        now: DateTime<Utc>,
    ) -> Result<Resolution, DispatchError> {
        match self
            .ctx
            .store
            .close_offer(&offer.id, OfferStatus::Declined, DeadlineGuard::Any)
            .await?
        {
            OfferTransition::Applied(declined) => {
                self.ctx.record(
                    &declined.job_id,
                    Some(declined.id),
                    Some(&declined.driver_id),
                    AuditAction::OfferDeclined,
                    Some(format!("conflicts with booking for job {}", existing.job_id)),
                );
                warn!(
                    "driver {} cannot take job {}: overlaps booking for job {}",
                    declined.driver_id, declined.job_id, existing.job_id
                );
                Ok(Resolution::for_offer(ResponseCode::ScheduleConflict, &declined).with_cascade())
            }
            OfferTransition::Rejected(current) => Ok(Resolution::for_offer(
                crate::core::offer::conflict_code(&current, now),
                &current,
            )),
            OfferTransition::Missing => Ok(Resolution::code(ResponseCode::NotFound)),
        }
    }
}
