//! Public entry points of the dispatch engine.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::core::cascade::{CascadeController, CascadeOutcome};
use crate::core::context::DispatchContext;
use crate::core::error::DispatchError;
use crate::core::audit::AuditAction;
use crate::core::model::{ExclusionList, JobStatus};
use crate::core::offer::{OfferAction, OfferManager, Resolution, ResponseCode};
use crate::core::reassign::{CancelReport, ReassignmentTrigger, RescheduleOutcome};
use crate::core::sweeper::{ExpirySweeper, SweepReport};
use crate::util::serde::{ContactHandle, DriverId, JobId, OfferId};

/// Outcome of a driver response, including any cascade it triggered.
#[derive(Debug, Clone)]
pub struct OfferResponse {
    /// Outcome code.
    pub code: ResponseCode,
    /// Job the response concerned.
    pub job_id: Option<JobId>,
    /// Offer the response concerned.
    pub offer_id: Option<OfferId>,
    /// Next step taken for the job after a decline or conflict.
    pub cascade: Option<CascadeOutcome>,
}

/// The assembled engine.
pub struct DispatchEngine {
    ctx: DispatchContext,
    offers: Arc<OfferManager>,
    cascade: Arc<CascadeController>,
    sweeper: ExpirySweeper,
    reassign: ReassignmentTrigger,
}

impl DispatchEngine {
    /// Wire the components around a shared context.
    pub fn new(ctx: DispatchContext) -> Self {
        let offers = Arc::new(OfferManager::new(ctx.clone()));
        let cascade = Arc::new(CascadeController::new(ctx.clone(), Arc::clone(&offers)));
        Self {
            sweeper: ExpirySweeper::new(ctx.clone(), Arc::clone(&cascade)),
            reassign: ReassignmentTrigger::new(ctx.clone(), Arc::clone(&cascade)),
            ctx,
            offers,
            cascade,
        }
    }

    /// Shared context.
    pub const fn context(&self) -> &DispatchContext {
        &self.ctx
    }

    /// Start dispatch for a job: offer it to the best candidate or escalate.
    ///
    /// Accepted from `unassigned`, and from `expired_no_candidates` so an
    /// operator can retry once the driver pool changes.
    pub async fn create_offer(&self, job_id: &JobId) -> Result<CascadeOutcome, DispatchError> {
        let job = self
            .ctx
            .store
            .job(job_id)
            .await?
            .ok_or_else(|| DispatchError::JobNotFound(job_id.clone()))?;
        self.ctx.job_window(&job)?;

        let started = self
            .ctx
            .store
            .transition_job(
                job_id,
                &[JobStatus::Unassigned, JobStatus::ExpiredNoCandidates],
                JobStatus::OfferPending,
            )
            .await?;
        if !started {
            let job = self
                .ctx
                .store
                .job(job_id)
                .await?
                .ok_or_else(|| DispatchError::JobNotFound(job_id.clone()))?;
            debug!("create_offer on job {} in state {:?}", job_id, job.status);
            return match job.status {
                JobStatus::Offered => Err(DispatchError::AlreadyOffered(job_id.clone())),
                // another cascade is ranking; offer issuance re-checks the job
                JobStatus::OfferPending => self.cascade.run(job_id).await,
                other => Ok(CascadeOutcome::Settled(other)),
            };
        }
        info!("dispatch started for job {}", job_id);
        self.cascade.run(job_id).await
    }

    /// Bar `driver_id` from future offers for `job_id`. Offers already sent
    /// are left to run their course.
    pub async fn exclude_driver(
        &self,
        job_id: &JobId,
        driver_id: &DriverId,
    ) -> Result<ExclusionList, DispatchError> {
        if self.ctx.store.job(job_id).await?.is_none() {
            return Err(DispatchError::JobNotFound(job_id.clone()));
        }
        let list = self.ctx.store.exclude(job_id, driver_id).await?;
        self.ctx
            .record(job_id, None, Some(driver_id), AuditAction::DriverExcluded, None);
        info!("driver {} excluded from job {}", driver_id, job_id);
        Ok(list)
    }

    /// A driver followed the deep link in their offer.
    pub async fn respond_to_offer(
        &self,
        token: &str,
        action: OfferAction,
    ) -> Result<OfferResponse, DispatchError> {
        let resolution = self.offers.respond(token, action).await?;
        self.finish(resolution).await
    }

    /// A driver replied through a channel that only identifies them by handle.
    pub async fn respond_to_offer_by_identity(
        &self,
        handle: &ContactHandle,
        action: OfferAction,
    ) -> Result<OfferResponse, DispatchError> {
        let resolution = self.offers.respond_by_identity(handle, action).await?;
        self.finish(resolution).await
    }

    async fn finish(&self, resolution: Resolution) -> Result<OfferResponse, DispatchError> {
        let cascade = match (&resolution.job_id, resolution.cascade) {
            (Some(job_id), true) => Some(self.cascade.run(job_id).await?),
            _ => None,
        };
        Ok(OfferResponse {
            code: resolution.code,
            job_id: resolution.job_id,
            offer_id: resolution.offer_id,
            cascade,
        })
    }

    /// Expire stale offers and cascade their jobs.
    pub async fn sweep_expired_offers(&self) -> Result<SweepReport, DispatchError> {
        self.sweeper.sweep().await
    }

    /// A booked driver cancelled.
    pub async fn cancel_booking(
        &self,
        job_id: &JobId,
        driver_id: &DriverId,
        reason: &str,
    ) -> Result<CancelReport, DispatchError> {
        self.reassign.cancel_booking(job_id, driver_id, reason).await
    }

    /// The job's start moved.
    pub async fn reschedule_job(
        &self,
        job_id: &JobId,
        new_start: DateTime<Utc>,
        reconfirmed: bool,
    ) -> Result<RescheduleOutcome, DispatchError> {
        self.reassign
            .reschedule_job(job_id, new_start, reconfirmed)
            .await
    }
}
