//! API-facing request/response models and thin handlers.
//!
//! Transport layers (HTTP, SMS webhooks, queues) deserialize a
//! [`DispatchRequest`], call [`handle`] and serialize the [`DispatchResponse`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{
    CascadeOutcome, DispatchEngine, JobStatus, OfferAction, OfferResponse, RescheduleOutcome,
    ResponseCode, SweepReport,
};
use crate::util::serde::{ContactHandle, DriverId, JobId, OfferId};

/// Inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchRequest {
    /// Driver response via deep-link token.
    Respond {
        /// Token from the deep link.
        token: String,
        /// Accept or decline.
        action: OfferAction,
    },
    /// Driver response identified by contact handle.
    RespondByIdentity {
        /// Sender's contact handle.
        handle: ContactHandle,
        /// Accept or decline.
        action: OfferAction,
    },
    /// Start dispatch for a job.
    CreateOffer {
        /// Job to dispatch.
        job_id: JobId,
    },
    /// Driver cancels a booking.
    CancelBooking {
        /// Booked job.
        job_id: JobId,
        /// Cancelling driver.
        driver_id: DriverId,
        /// Free-form reason.
        #[serde(default)]
        reason: String,
    },
    /// Job start moved.
    Reschedule {
        /// Rescheduled job.
        job_id: JobId,
        /// New base start.
        new_start: DateTime<Utc>,
        /// Driver already agreed to the new time.
        #[serde(default)]
        reconfirmed: bool,
    },
    /// Run one expiry sweep.
    Sweep,
    /// Liveness check.
    Health,
}

/// What happened to a job after a cascade step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CascadeSummary {
    /// A new offer went out.
    Offered {
        /// Offered job.
        job_id: JobId,
        /// New offer.
        offer_id: OfferId,
        /// Addressed driver.
        driver_id: DriverId,
        /// Response deadline.
        expires_at: DateTime<Utc>,
        /// Notification failed; the offer is still live.
        notification_failed: bool,
    },
    /// An offer was already out.
    AlreadyOffered,
    /// Escalated to an administrator.
    Escalated {
        /// Escalated job.
        job_id: JobId,
        /// Why.
        reason: String,
    },
    /// Nothing to do.
    Settled {
        /// Current job status.
        status: JobStatus,
    },
}

impl From<&CascadeOutcome> for CascadeSummary {
    fn from(outcome: &CascadeOutcome) -> Self {
        match outcome {
            CascadeOutcome::Offered(issued) => Self::Offered {
                job_id: issued.offer.job_id.clone(),
                offer_id: issued.offer.id,
                driver_id: issued.offer.driver_id.clone(),
                expires_at: issued.offer.expires_at,
                notification_failed: issued.notification_error.is_some(),
            },
            CascadeOutcome::AlreadyOffered => Self::AlreadyOffered,
            CascadeOutcome::Escalated(alert) => Self::Escalated {
                job_id: alert.job_id.clone(),
                reason: alert.reason.clone(),
            },
            CascadeOutcome::Settled(status) => Self::Settled { status: *status },
        }
    }
}

/// Result of a driver response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespondBody {
    /// Outcome code.
    pub code: ResponseCode,
    /// Job concerned.
    pub job_id: Option<JobId>,
    /// Offer concerned.
    pub offer_id: Option<OfferId>,
    /// Follow-up cascade step, if one ran.
    pub next: Option<CascadeSummary>,
}

impl From<OfferResponse> for RespondBody {
    fn from(r: OfferResponse) -> Self {
        Self {
            code: r.code,
            job_id: r.job_id,
            offer_id: r.offer_id,
            next: r.cascade.as_ref().map(CascadeSummary::from),
        }
    }
}

/// Result of a cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelBody {
    /// Jobs whose booking was released.
    pub released: Vec<JobId>,
    /// Cascade step per released job.
    pub cascades: Vec<CascadeSummary>,
}

/// Result of a reschedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RescheduleBody {
    /// No booking existed.
    Unbooked,
    /// Booked driver keeps the job.
    Kept {
        /// Driver keeping the job.
        driver_id: DriverId,
    },
    /// Booking released.
    Released {
        /// Driver who lost the job.
        driver_id: DriverId,
        /// Whether they were excluded.
        excluded: bool,
        /// Follow-up cascade step.
        next: CascadeSummary,
    },
}

impl From<&RescheduleOutcome> for RescheduleBody {
    fn from(outcome: &RescheduleOutcome) -> Self {
        match outcome {
            RescheduleOutcome::Unbooked(_) => Self::Unbooked,
            RescheduleOutcome::Kept(booking) => Self::Kept {
                driver_id: booking.driver_id.clone(),
            },
            RescheduleOutcome::Released {
                booking,
                excluded,
                cascade,
            } => Self::Released {
                driver_id: booking.driver_id.clone(),
                excluded: *excluded,
                next: CascadeSummary::from(cascade),
            },
        }
    }
}

/// Health response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
}

/// Outbound response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum DispatchResponse {
    /// Driver response processed.
    Respond(RespondBody),
    /// Dispatch started.
    CreateOffer(CascadeSummary),
    /// Cancellation processed.
    CancelBooking(CancelBody),
    /// Reschedule processed.
    Reschedule(RescheduleBody),
    /// Sweep counters.
    Sweep(SweepReport),
    /// Liveness.
    Health(Health),
    /// The operation failed; state is unchanged for this request.
    Error {
        /// Error message.
        message: String,
    },
}

/// Route a request to the engine.
pub async fn handle(engine: &DispatchEngine, req: DispatchRequest) -> DispatchResponse {
    let result = match req {
        DispatchRequest::Respond { token, action } => {
            respond(engine, &token, action).await.map(DispatchResponse::Respond)
        }
        DispatchRequest::RespondByIdentity { handle, action } => {
            respond_by_identity(engine, &handle, action)
                .await
                .map(DispatchResponse::Respond)
        }
        DispatchRequest::CreateOffer { job_id } => {
            create_offer(engine, &job_id).await.map(DispatchResponse::CreateOffer)
        }
        DispatchRequest::CancelBooking {
            job_id,
            driver_id,
            reason,
        } => cancel_booking(engine, &job_id, &driver_id, &reason)
            .await
            .map(DispatchResponse::CancelBooking),
        DispatchRequest::Reschedule {
            job_id,
            new_start,
            reconfirmed,
        } => reschedule(engine, &job_id, new_start, reconfirmed)
            .await
            .map(DispatchResponse::Reschedule),
        DispatchRequest::Sweep => sweep(engine).await.map(DispatchResponse::Sweep),
        DispatchRequest::Health => Ok(DispatchResponse::Health(health())),
    };
    result.unwrap_or_else(|message| DispatchResponse::Error { message })
}

/// Process a token response.
pub async fn respond(
    engine: &DispatchEngine,
    token: &str,
    action: OfferAction,
) -> Result<RespondBody, String> {
    engine
        .respond_to_offer(token, action)
        .await
        .map(RespondBody::from)
        .map_err(|e| e.to_string())
}

/// Process a handle-identified response.
pub async fn respond_by_identity(
    engine: &DispatchEngine,
    handle: &ContactHandle,
    action: OfferAction,
) -> Result<RespondBody, String> {
    engine
        .respond_to_offer_by_identity(handle, action)
        .await
        .map(RespondBody::from)
        .map_err(|e| e.to_string())
}

/// Start dispatch for a job.
pub async fn create_offer(engine: &DispatchEngine, job_id: &JobId) -> Result<CascadeSummary, String> {
    engine
        .create_offer(job_id)
        .await
        .map(|outcome| CascadeSummary::from(&outcome))
        .map_err(|e| e.to_string())
}

/// Process a driver cancellation.
pub async fn cancel_booking(
    engine: &DispatchEngine,
    job_id: &JobId,
    driver_id: &DriverId,
    reason: &str,
) -> Result<CancelBody, String> {
    let report = engine
        .cancel_booking(job_id, driver_id, reason)
        .await
        .map_err(|e| e.to_string())?;
    Ok(CancelBody {
        released: report.released.iter().map(|b| b.job_id.clone()).collect(),
        cascades: report
            .cascades
            .iter()
            .map(|(_, outcome)| CascadeSummary::from(outcome))
            .collect(),
    })
}

/// Process a schedule edit.
pub async fn reschedule(
    engine: &DispatchEngine,
    job_id: &JobId,
    new_start: DateTime<Utc>,
    reconfirmed: bool,
) -> Result<RescheduleBody, String> {
    engine
        .reschedule_job(job_id, new_start, reconfirmed)
        .await
        .map(|outcome| RescheduleBody::from(&outcome))
        .map_err(|e| e.to_string())
}

/// Run one sweep.
pub async fn sweep(engine: &DispatchEngine) -> Result<SweepReport, String> {
    engine.sweep_expired_offers().await.map_err(|e| e.to_string())
}

/// Return a health payload.
pub const fn health() -> Health {
    Health { ok: true }
}
