//! Periodic expiry of unanswered offers.
//!
//! The sweeper keeps no state between runs. Each stale offer is claimed by a
//! conditional `sent -> expired` transition, so overlapping sweeps (or a sweep
//! racing a late accept) process every offer at most once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::core::audit::AuditAction;
use crate::core::cascade::{CascadeController, CascadeOutcome};
use crate::core::context::DispatchContext;
use crate::core::error::DispatchError;
use crate::core::model::{JobStatus, Offer, OfferStatus};
use crate::core::ports::{DeadlineGuard, OfferTransition};

/// Counters from one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Stale offers found.
    pub scanned: usize,
    /// Offers this run moved to `expired`.
    pub expired: usize,
    /// Jobs re-offered to another driver.
    pub reoffered: usize,
    /// Jobs escalated for lack of candidates.
    pub escalated: usize,
    /// Jobs left in `offer_pending` by an earlier failure and resumed.
    pub resumed: usize,
    /// Offers or jobs whose processing failed; retried next run.
    pub failed: usize,
}

/// Converts stale `sent` offers into `expired` and cascades their jobs.
pub struct ExpirySweeper {
    ctx: DispatchContext,
    cascade: Arc<CascadeController>,
}

impl ExpirySweeper {
    /// Create a sweeper.
    pub const fn new(ctx: DispatchContext, cascade: Arc<CascadeController>) -> Self {
        Self { ctx, cascade }
    }

    /// Run one sweep at the clock's current time.
    pub async fn sweep(&self) -> Result<SweepReport, DispatchError> {
        let now = self.ctx.now();
        let stale = self.ctx.store.stale_offers(now).await?;
        let mut report = SweepReport {
            scanned: stale.len(),
            ..SweepReport::default()
        };

        for offer in stale {
            match self.expire_one(&offer, now).await {
                Ok(None) => {}
                Ok(Some(outcome)) => {
                    report.expired += 1;
                    match outcome {
                        CascadeOutcome::Offered(_) => report.reoffered += 1,
                        CascadeOutcome::Escalated(_) => report.escalated += 1,
                        CascadeOutcome::AlreadyOffered | CascadeOutcome::Settled(_) => {}
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    error!("failed to expire offer {}: {}", offer.id, e);
                }
            }
        }

        if let Err(e) = self.resume_pending(&mut report).await {
            report.failed += 1;
            error!("failed to list pending jobs: {}", e);
        }

        if report.scanned > 0 || report.resumed > 0 || report.failed > 0 {
            info!(
                "sweep: scanned={} expired={} reoffered={} escalated={} resumed={} failed={}",
                report.scanned,
                report.expired,
                report.reoffered,
                report.escalated,
                report.resumed,
                report.failed
            );
        }
        Ok(report)
    }

    /// Re-run the cascade for jobs stuck in `offer_pending`, e.g. because a
    /// previous cascade hit a store error after its offer expired.
    async fn resume_pending(&self, report: &mut SweepReport) -> Result<(), DispatchError> {
        let pending = self
            .ctx
            .store
            .jobs_with_status(JobStatus::OfferPending)
            .await?;
        for job in pending {
            match self.cascade.run(&job.id).await {
                Ok(CascadeOutcome::Offered(_)) => {
                    report.resumed += 1;
                    report.reoffered += 1;
                }
                Ok(CascadeOutcome::Escalated(_)) => {
                    report.resumed += 1;
                    report.escalated += 1;
                }
                Ok(CascadeOutcome::AlreadyOffered | CascadeOutcome::Settled(_)) => {}
                Err(e) => {
                    report.failed += 1;
                    error!("failed to resume cascade for job {}: {}", job.id, e);
                }
            }
        }
        Ok(())
    }

    /// Returns `None` when another actor resolved the offer first.
    async fn expire_one(
        &self,
        offer: &Offer,
        now: DateTime<Utc>,
    ) -> Result<Option<CascadeOutcome>, DispatchError> {
        let expired = match self
            .ctx
            .store
            .close_offer(&offer.id, OfferStatus::Expired, DeadlineGuard::AtOrAfter(now))
            .await?
        {
            OfferTransition::Applied(expired) => expired,
            OfferTransition::Rejected(current) => {
                debug!("offer {} already {:?}; skipping", current.id, current.status);
                return Ok(None);
            }
            OfferTransition::Missing => return Ok(None),
        };

        self.ctx.record(
            &expired.job_id,
            Some(expired.id),
            Some(&expired.driver_id),
            AuditAction::OfferExpired,
            None,
        );
        info!(
            "offer {} for job {} expired without response from {}",
            expired.id, expired.job_id, expired.driver_id
        );

        self.cascade.run(&expired.job_id).await.map(Some)
    }
}
