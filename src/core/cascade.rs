//! Re-offering after a decline, expiry or cancellation.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::core::audit::AuditAction;
use crate::core::availability::AvailabilityIndex;
use crate::core::context::DispatchContext;
use crate::core::error::DispatchError;
use crate::core::model::{ExclusionList, Job, JobStatus};
use crate::core::offer::{IssuedOffer, OfferManager};
use crate::core::ports::AlertContext;
use crate::core::ranker::CandidateRanker;
use crate::util::serde::JobId;

/// What one cascade step did.
#[derive(Debug, Clone)]
pub enum CascadeOutcome {
    /// A new offer went out.
    Offered(IssuedOffer),
    /// Another caller already has an offer out for the job.
    AlreadyOffered,
    /// No candidates remain; the job was escalated.
    Escalated(AlertContext),
    /// The job is not awaiting a candidate (accepted, escalated, unassigned).
    Settled(JobStatus),
}

/// Drives a job to its next offer or to escalation.
pub struct CascadeController {
    ctx: DispatchContext,
    availability: AvailabilityIndex,
    ranker: CandidateRanker,
    offers: Arc<OfferManager>,
}

impl CascadeController {
    /// Create a controller.
    pub fn new(ctx: DispatchContext, offers: Arc<OfferManager>) -> Self {
        Self {
            availability: AvailabilityIndex::new(ctx.clone()),
            ranker: CandidateRanker::new(ctx.config.ranking.clone()),
            ctx,
            offers,
        }
    }

    /// Offer the job to the best remaining candidate, or escalate.
    ///
    /// Only acts on jobs in `offer_pending`. Calling it twice for the same
    /// event never produces two `sent` offers.
    pub async fn run(&self, job_id: &JobId) -> Result<CascadeOutcome, DispatchError> {
        let job = self
            .ctx
            .store
            .job(job_id)
            .await?
            .ok_or_else(|| DispatchError::JobNotFound(job_id.clone()))?;

        match job.status {
            JobStatus::OfferPending => {}
            JobStatus::Offered => return Ok(CascadeOutcome::AlreadyOffered),
            other => {
                debug!("job {} is {:?}; nothing to cascade", job.id, other);
                return Ok(CascadeOutcome::Settled(other));
            }
        }

        let exclusions = self.ctx.store.exclusions(&job.id).await?;
        let candidates = self.availability.eligible(&job, &exclusions).await?;
        let ranked = self.ranker.rank(candidates);

        for rc in ranked
            .iter()
            .filter(|rc| !exclusions.contains(&rc.candidate.driver_id))
        {
            match self.offers.create(&job, &rc.candidate, &exclusions).await {
                Ok(issued) => {
                    debug!(
                        "job {} offered to {} (score {:.2})",
                        job.id, rc.candidate.driver_id, rc.score
                    );
                    return Ok(CascadeOutcome::Offered(issued));
                }
                Err(DispatchError::AlreadyOffered(_)) => return Ok(CascadeOutcome::AlreadyOffered),
                Err(DispatchError::NotOpen { status, .. }) => {
                    // another cascade settled the job while this one ranked
                    debug!("job {} moved to {:?} during cascade", job.id, status);
                    return Ok(match status {
                        JobStatus::Offered => CascadeOutcome::AlreadyOffered,
                        other => CascadeOutcome::Settled(other),
                    });
                }
                Err(DispatchError::Ineligible { driver, reason }) => {
                    warn!("skipping driver {} for job {}: {}", driver, job.id, reason);
                }
                Err(e) => return Err(e),
            }
        }

        self.escalate(&job, &exclusions).await
    }

    async fn escalate(
        &self,
        job: &Job,
        exclusions: &ExclusionList,
    ) -> Result<CascadeOutcome, DispatchError> {
        let part_start = self.ctx.part_start(job)?;
        let escalated = self
            .ctx
            .store
            .transition_job(
                &job.id,
                &[JobStatus::OfferPending],
                JobStatus::ExpiredNoCandidates,
            )
            .await?;
        if !escalated {
            let current = self
                .ctx
                .store
                .job(&job.id)
                .await?
                .map_or(JobStatus::Unassigned, |j| j.status);
            return Ok(match current {
                JobStatus::Offered => CascadeOutcome::AlreadyOffered,
                other => CascadeOutcome::Settled(other),
            });
        }

        let alert = AlertContext {
            job_id: job.id.clone(),
            kind: job.kind,
            capability: job.capability.clone(),
            scheduled_start: job.scheduled_start,
            part_start,
            location: job.location.clone(),
            excluded: exclusions.to_vec(),
            reason: format!(
                "no eligible drivers remain ({} excluded)",
                exclusions.len()
            ),
        };
        self.ctx.record(
            &job.id,
            None,
            None,
            AuditAction::JobEscalated,
            Some(alert.reason.clone()),
        );
        info!("job {} escalated: {}", job.id, alert.reason);

        if let Err(e) = self.ctx.alerts.notify(&alert).await {
            error!("admin alert for job {} failed: {}", job.id, e);
        }
        Ok(CascadeOutcome::Escalated(alert))
    }
}
