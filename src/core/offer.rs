//! Offer lifecycle: issue, validate responses, decline.
//!
//! ```text
//! none -> sent -> accepted
//!              -> declined
//!              -> expired   (sweeper only)
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::acceptance::AtomicAcceptance;
use crate::core::audit::AuditAction;
use crate::core::availability::Candidate;
use crate::core::context::DispatchContext;
use crate::core::error::{DispatchError, NotifyError, TokenError};
use crate::core::model::{ExclusionList, Job, Offer, OfferStatus};
use crate::core::ports::{DeadlineGuard, IssueOutcome, OfferTransition};
use crate::core::token::OfferClaims;
use crate::util::serde::{ContactHandle, DriverId, JobId, OfferId};

/// What the driver wants to do with an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferAction {
    /// Take the job.
    Accept,
    /// Pass on the job.
    Decline,
}

/// Outcome code returned to whoever relayed the driver's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseCode {
    /// Offer accepted and booking created.
    Accepted,
    /// Offer declined; cascade continues.
    Declined,
    /// Token or offer deadline has passed.
    Expired,
    /// The job was already accepted.
    AlreadyAccepted,
    /// No offer exists for the job or driver.
    NotFound,
    /// The offer is no longer awaiting a response.
    NotSent,
    /// The responding driver is not the offer's addressee.
    WrongDriver,
    /// Token is malformed or its signature does not verify.
    InvalidToken,
    /// The driver picked up an overlapping booking before accepting.
    ScheduleConflict,
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Accepted => "ACCEPTED",
            Self::Declined => "DECLINED",
            Self::Expired => "EXPIRED",
            Self::AlreadyAccepted => "ALREADY_ACCEPTED",
            Self::NotFound => "NOT_FOUND",
            Self::NotSent => "NOT_SENT",
            Self::WrongDriver => "WRONG_DRIVER",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::ScheduleConflict => "SCHEDULE_CONFLICT",
        };
        f.write_str(s)
    }
}

/// Result of processing a driver response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Outcome code.
    pub code: ResponseCode,
    /// Job the response concerned, when known.
    pub job_id: Option<JobId>,
    /// Offer the response concerned, when known.
    pub offer_id: Option<OfferId>,
    /// Whether the job must re-enter the cascade.
    pub cascade: bool,
}

impl Resolution {
    pub(crate) const fn code(code: ResponseCode) -> Self {
        Self {
            code,
            job_id: None,
            offer_id: None,
            cascade: false,
        }
    }

    pub(crate) fn for_offer(code: ResponseCode, offer: &Offer) -> Self {
        Self {
            code,
            job_id: Some(offer.job_id.clone()),
            offer_id: Some(offer.id),
            cascade: false,
        }
    }

    pub(crate) fn with_cascade(mut self) -> Self {
        self.cascade = true;
        self
    }
}

/// Code for an offer that failed a conditional transition.
pub(crate) fn conflict_code(offer: &Offer, now: DateTime<Utc>) -> ResponseCode {
    match offer.status {
        OfferStatus::Accepted => ResponseCode::AlreadyAccepted,
        OfferStatus::Expired => ResponseCode::Expired,
        OfferStatus::Declined => ResponseCode::NotSent,
        OfferStatus::Sent if offer.is_past_deadline(now) => ResponseCode::Expired,
        OfferStatus::Sent => ResponseCode::NotSent,
    }
}

/// A freshly issued offer.
#[derive(Debug, Clone)]
pub struct IssuedOffer {
    /// Persisted offer.
    pub offer: Offer,
    /// Signed token embedded in the deep link.
    pub token: String,
    /// Link sent to the driver.
    pub deep_link: String,
    /// Set when the notification could not be sent; the offer stays live.
    pub notification_error: Option<NotifyError>,
}

/// Owns offer creation and response handling.
pub struct OfferManager {
    ctx: DispatchContext,
    acceptance: AtomicAcceptance,
}

impl OfferManager {
    /// Create a manager.
    pub fn new(ctx: DispatchContext) -> Self {
        Self {
            acceptance: AtomicAcceptance::new(ctx.clone()),
            ctx,
        }
    }

    /// Issue a `sent` offer for `job` to `candidate` and notify them.
    ///
    /// Fails with [`DispatchError::AlreadyOffered`] if the job already has a
    /// `sent` offer, with [`DispatchError::NotOpen`] if the job stopped
    /// awaiting a candidate and with [`DispatchError::Ineligible`] if the
    /// candidate cannot be reached or was excluded after ranking.
    pub async fn create(
        &self,
        job: &Job,
        candidate: &Candidate,
        exclusions: &ExclusionList,
    ) -> Result<IssuedOffer, DispatchError> {
        let Some(contact) = candidate.contact.clone() else {
            return Err(DispatchError::Ineligible {
                driver: candidate.driver_id.clone(),
                reason: "no contact handle".into(),
            });
        };

        let settings = self.ctx.config.offers_for(job.kind);
        let starts_at = self.ctx.part_start(job)?;
        let now = self.ctx.now();
        let offer_id = OfferId::generate();
        let claims = OfferClaims::new(
            offer_id,
            job.id.clone(),
            candidate.driver_id.clone(),
            now,
            settings.ttl(),
        )
        .ok_or_else(|| DispatchError::OutOfRange {
            job: job.id.clone(),
            what: "offer deadline",
        })?;
        let token = self.ctx.tokens.encode(&claims)?;
        let offer = Offer {
            id: offer_id,
            job_id: job.id.clone(),
            driver_id: candidate.driver_id.clone(),
            issued_at: claims.issued_at,
            expires_at: claims.expires_at,
            status: OfferStatus::Sent,
            excluded: exclusions.to_vec(),
        };

        let offer = match self.ctx.store.issue_offer(offer).await? {
            IssueOutcome::Issued(offer) => offer,
            IssueOutcome::AlreadyOffered => {
                warn!("job {} already has a sent offer; skipping", job.id);
                return Err(DispatchError::AlreadyOffered(job.id.clone()));
            }
            IssueOutcome::Excluded => {
                return Err(DispatchError::Ineligible {
                    driver: candidate.driver_id.clone(),
                    reason: "excluded after ranking".into(),
                });
            }
            IssueOutcome::JobNotOpen(status) => {
                return Err(DispatchError::NotOpen {
                    job: job.id.clone(),
                    status,
                });
            }
            IssueOutcome::JobMissing => return Err(DispatchError::JobNotFound(job.id.clone())),
        };
        self.ctx.record(
            &job.id,
            Some(offer.id),
            Some(&offer.driver_id),
            AuditAction::OfferSent,
            None,
        );
        info!(
            "offer {} for job {} sent to driver {} (expires {})",
            offer.id, job.id, offer.driver_id, offer.expires_at
        );

        let deep_link = format!(
            "{}/{}",
            self.ctx.config.deep_link_base.trim_end_matches('/'),
            token
        );
        let notification_error = self
            .notify(job, &offer, &contact, &settings.template, &deep_link, starts_at)
            .await
            .err();

        Ok(IssuedOffer {
            offer,
            token,
            deep_link,
            notification_error,
        })
    }

    async fn notify(
        &self,
        job: &Job,
        offer: &Offer,
        contact: &ContactHandle,
        template: &str,
        deep_link: &str,
        starts_at: DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        let mut vars = BTreeMap::new();
        vars.insert("job_id".to_string(), job.id.to_string());
        vars.insert("kind".to_string(), job.kind.to_string());
        vars.insert(
            "starts_at".to_string(),
            starts_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        vars.insert(
            "expires_at".to_string(),
            offer.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        vars.insert("link".to_string(), deep_link.to_string());
        if let Some(location) = &job.location {
            vars.insert("location".to_string(), location.clone());
        }

        self.ctx
            .notifier
            .send(contact, template, &vars)
            .await
            .inspect_err(|e| {
                warn!(
                    "offer {} notification to driver {} failed: {}",
                    offer.id, offer.driver_id, e
                );
            })
    }

    /// Handle a response carrying a signed token.
    pub async fn respond(
        &self,
        token: &str,
        action: OfferAction,
    ) -> Result<Resolution, DispatchError> {
        let now = self.ctx.now();
        let claims = match self.ctx.tokens.decode(token, now) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => return Ok(Resolution::code(ResponseCode::Expired)),
            Err(e) => {
                warn!("rejected offer token: {}", e);
                return Ok(Resolution::code(ResponseCode::InvalidToken));
            }
        };

        let Some(offer) = self.ctx.store.latest_offer(&claims.job_id).await? else {
            return Ok(Resolution::code(ResponseCode::NotFound));
        };
        if offer.driver_id == claims.driver_id && offer.id != claims.offer_id {
            warn!(
                "token for offer {} used after job {} was re-offered as {}",
                claims.offer_id, offer.job_id, offer.id
            );
            return Ok(Resolution::for_offer(ResponseCode::NotSent, &offer));
        }
        self.resolve(offer, &claims.driver_id, action, now).await
    }

    /// Handle a response identified only by the driver's contact handle.
    pub async fn respond_by_identity(
        &self,
        handle: &ContactHandle,
        action: OfferAction,
    ) -> Result<Resolution, DispatchError> {
        let now = self.ctx.now();
        let Some(driver) = self.ctx.directory.driver_by_handle(handle).await? else {
            return Ok(Resolution::code(ResponseCode::NotFound));
        };
        let offers = self.ctx.store.sent_offers_for_driver(&driver.id).await?;
        let Some(offer) = offers.into_iter().max_by_key(|o| o.issued_at) else {
            return Ok(Resolution::code(ResponseCode::NotFound));
        };
        if offer.is_past_deadline(now) {
            return Ok(Resolution::for_offer(ResponseCode::Expired, &offer));
        }
        self.resolve(offer, &driver.id, action, now).await
    }

    async fn resolve(
        &self,
        offer: Offer,
        responder: &DriverId,
        action: OfferAction,
        now: DateTime<Utc>,
    ) -> Result<Resolution, DispatchError> {
        if offer.status != OfferStatus::Sent {
            // a stale link for a job that moved on to someone else
            let code = if offer.driver_id == *responder {
                conflict_code(&offer, now)
            } else {
                ResponseCode::NotSent
            };
            return Ok(Resolution::for_offer(code, &offer));
        }
        if offer.driver_id != *responder {
            warn!(
                "driver {} responded to offer {} addressed to {}",
                responder, offer.id, offer.driver_id
            );
            return Ok(Resolution::for_offer(ResponseCode::WrongDriver, &offer));
        }
        match action {
            OfferAction::Accept => self.acceptance.accept(&offer, now).await,
            OfferAction::Decline => self.decline(&offer, now).await,
        }
    }

    async fn decline(&self, offer: &Offer, now: DateTime<Utc>) -> Result<Resolution, DispatchError> {
        match self
            .ctx
            .store
            .close_offer(&offer.id, OfferStatus::Declined, DeadlineGuard::Before(now))
            .await?
        {
            OfferTransition::Applied(declined) => {
                self.ctx.record(
                    &declined.job_id,
                    Some(declined.id),
                    Some(&declined.driver_id),
                    AuditAction::OfferDeclined,
                    None,
                );
                info!(
                    "driver {} declined offer {} for job {}",
                    declined.driver_id, declined.id, declined.job_id
                );
                Ok(Resolution::for_offer(ResponseCode::Declined, &declined).with_cascade())
            }
            OfferTransition::Rejected(current) => {
                let code = conflict_code(&current, now);
                warn!("decline of offer {} rejected: {}", current.id, code);
                Ok(Resolution::for_offer(code, &current))
            }
            OfferTransition::Missing => Ok(Resolution::code(ResponseCode::NotFound)),
        }
    }
}
