//! Signed offer tokens.
//!
//! A token is `base64url(json(claims)) "." base64url(hmac_sha256(secret, payload))`.
//! The codec is a trait so hosts can swap in JWTs or an opaque lookup table.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::core::error::TokenError;
use crate::util::serde::{DriverId, JobId, OfferId};

type HmacSha256 = Hmac<Sha256>;

/// Payload bound into an offer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferClaims {
    /// Offer the token was issued for.
    pub offer_id: OfferId,
    /// Offered job.
    pub job_id: JobId,
    /// Addressed driver.
    pub driver_id: DriverId,
    /// Issue time.
    pub issued_at: DateTime<Utc>,
    /// Deadline.
    pub expires_at: DateTime<Utc>,
}

impl OfferClaims {
    /// Claims for an offer issued at `issued_at` living for `ttl`, or `None`
    /// if the deadline is not representable.
    pub fn new(
        offer_id: OfferId,
        job_id: JobId,
        driver_id: DriverId,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Option<Self> {
        Some(Self {
            offer_id,
            job_id,
            driver_id,
            issued_at,
            expires_at: issued_at.checked_add_signed(ttl)?,
        })
    }
}

/// Opaque, tamper-evident, expiring token codec.
pub trait TokenCodec: Send + Sync {
    /// Encode claims into a token.
    fn encode(&self, claims: &OfferClaims) -> Result<String, TokenError>;

    /// Decode and verify a token, rejecting it if expired at `now`.
    fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<OfferClaims, TokenError>;
}

/// HMAC-SHA256 token codec.
pub struct HmacTokenCodec {
    secret: Vec<u8>,
}

impl HmacTokenCodec {
    /// Create a codec from a shared secret.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::Malformed)
    }
}

impl std::fmt::Debug for HmacTokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacTokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec for HmacTokenCodec {
    fn encode(&self, claims: &OfferClaims) -> Result<String, TokenError> {
        let json = serde_json::to_vec(claims).map_err(|_| TokenError::Malformed)?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<OfferClaims, TokenError> {
        let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let claims: OfferClaims =
            serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)?;

        if now >= claims.expires_at {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}
