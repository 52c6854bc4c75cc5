//! Dispatch engine configuration structures.

use chrono::{Duration, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::util::serde::JobKind;

/// Longest buffer or service duration accepted, in minutes (one week).
pub const MAX_WINDOW_MINS: i64 = 7 * 24 * 60;
/// Longest per-unit stagger accepted, in minutes (one day).
pub const MAX_STAGGER_MINS: i64 = 24 * 60;
/// Longest offer lifetime accepted, in seconds (thirty days).
pub const MAX_OFFER_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Window geometry shared by every conflict check.
///
/// All blocked windows are computed with the same buffers so that two
/// independently computed windows are comparable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WindowConfig {
    /// Minutes blocked before a job part starts.
    pub pre_buffer_mins: i64,
    /// Minutes the service itself takes.
    pub service_mins: i64,
    /// Minutes blocked after the service ends.
    pub post_buffer_mins: i64,
    /// Per-unit offset for multi-part jobs.
    pub stagger_mins: i64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            pre_buffer_mins: 15,
            service_mins: 60,
            post_buffer_mins: 10,
            stagger_mins: 45,
        }
    }
}

/// Per job-kind offer settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OfferLifetimeConfig {
    /// How long a driver has to respond, in seconds.
    pub offer_ttl_secs: u64,
    /// Notification template used for the offer message.
    pub template: String,
}

/// Weights and caps for candidate scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankingWeights {
    /// Multiplier applied to the driver rating.
    pub rating: f64,
    /// Multiplier applied to completed jobs.
    pub completed: f64,
    /// Completed jobs beyond this count do not add score.
    pub completed_cap: u32,
    /// Multiplier applied to recent jobs.
    pub recent: f64,
    /// Recent jobs beyond this count do not add score.
    pub recent_cap: u32,
    /// Multiplier applied to weekly available hours.
    pub hours: f64,
    /// Weekly hours beyond this amount do not add score.
    pub hours_cap: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            rating: 10.0,
            completed: 0.5,
            completed_cap: 40,
            recent: 1.0,
            recent_cap: 10,
            hours: 0.25,
            hours_cap: 40.0,
        }
    }
}

/// Root dispatch configuration, passed explicitly into the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Secret used to sign offer tokens.
    pub token_secret: String,
    /// Base URL the offer token is appended to in notifications.
    pub deep_link_base: String,
    /// Fixed offset of the business's local time, used for weekly availability
    /// and calendar-date lookups.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Interval between expiry sweeps in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Window geometry.
    #[serde(default)]
    pub window: WindowConfig,
    /// Offer settings for single-stop tasks.
    #[serde(default = "default_task_offer")]
    pub task: OfferLifetimeConfig,
    /// Offer settings for delivery routes.
    #[serde(default = "default_route_offer")]
    pub route: OfferLifetimeConfig,
    /// Ranking weights.
    #[serde(default)]
    pub ranking: RankingWeights,
}

const fn default_sweep_interval() -> u64 {
    60
}

fn default_task_offer() -> OfferLifetimeConfig {
    OfferLifetimeConfig {
        offer_ttl_secs: 3600,
        template: "task_offer".into(),
    }
}

fn default_route_offer() -> OfferLifetimeConfig {
    OfferLifetimeConfig {
        offer_ttl_secs: 900,
        template: "route_offer".into(),
    }
}

impl WindowConfig {
    /// Validate window values.
    pub fn validate(&self) -> Result<(), String> {
        if self.service_mins <= 0 {
            return Err("service_mins must be greater than 0".into());
        }
        if self.pre_buffer_mins < 0 || self.post_buffer_mins < 0 {
            return Err("buffers must not be negative".into());
        }
        if self.stagger_mins < 0 {
            return Err("stagger_mins must not be negative".into());
        }
        if [self.pre_buffer_mins, self.service_mins, self.post_buffer_mins]
            .iter()
            .any(|m| *m > MAX_WINDOW_MINS)
        {
            return Err(format!("buffers and service_mins must not exceed {MAX_WINDOW_MINS}"));
        }
        if self.stagger_mins > MAX_STAGGER_MINS {
            return Err(format!("stagger_mins must not exceed {MAX_STAGGER_MINS}"));
        }
        Ok(())
    }
}

impl OfferLifetimeConfig {
    /// Validate offer settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.offer_ttl_secs == 0 {
            return Err("offer_ttl_secs must be greater than 0".into());
        }
        if self.offer_ttl_secs > MAX_OFFER_TTL_SECS {
            return Err(format!("offer_ttl_secs must not exceed {MAX_OFFER_TTL_SECS}"));
        }
        if self.template.trim().is_empty() {
            return Err("template must not be empty".into());
        }
        Ok(())
    }

    /// Offer lifetime as a duration.
    pub fn ttl(&self) -> Duration {
        i64::try_from(self.offer_ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }
}

impl RankingWeights {
    /// Validate that weights are finite and non-negative.
    pub fn validate(&self) -> Result<(), String> {
        let values = [self.rating, self.completed, self.recent, self.hours, self.hours_cap];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err("ranking weights must be finite and non-negative".into());
        }
        Ok(())
    }
}

impl DispatchConfig {
    /// Configuration with defaults for everything except the signing secret
    /// and link base.
    pub fn new(token_secret: impl Into<String>, deep_link_base: impl Into<String>) -> Self {
        Self {
            token_secret: token_secret.into(),
            deep_link_base: deep_link_base.into(),
            utc_offset_minutes: 0,
            sweep_interval_secs: default_sweep_interval(),
            window: WindowConfig::default(),
            task: default_task_offer(),
            route: default_route_offer(),
            ranking: RankingWeights::default(),
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        if self.token_secret.len() < 16 {
            return Err("token_secret must be at least 16 bytes".into());
        }
        if self.deep_link_base.trim().is_empty() {
            return Err("deep_link_base must not be empty".into());
        }
        if self.sweep_interval_secs == 0 {
            return Err("sweep_interval_secs must be greater than 0".into());
        }
        if self.local_offset().is_none() {
            return Err(format!(
                "utc_offset_minutes {} is out of range",
                self.utc_offset_minutes
            ));
        }
        self.window.validate().map_err(|e| format!("window invalid: {e}"))?;
        self.task.validate().map_err(|e| format!("task offers invalid: {e}"))?;
        self.route
            .validate()
            .map_err(|e| format!("route offers invalid: {e}"))?;
        self.ranking
            .validate()
            .map_err(|e| format!("ranking invalid: {e}"))?;
        Ok(())
    }

    /// Offer settings for a job kind.
    pub const fn offers_for(&self, kind: JobKind) -> &OfferLifetimeConfig {
        match kind {
            JobKind::Task => &self.task,
            JobKind::Route => &self.route,
        }
    }

    /// Local business offset, `None` when out of range.
    pub fn local_offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.checked_mul(60)?)
    }

    /// Parse dispatch configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `DISPATCH_*` environment variables, loading a
    /// `.env` file first if one exists.
    ///
    /// `DISPATCH_TOKEN_SECRET` and `DISPATCH_DEEP_LINK_BASE` are required; the
    /// remaining variables override defaults.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("DISPATCH_TOKEN_SECRET")
            .ok_or_else(|| "DISPATCH_TOKEN_SECRET is not set".to_string())?;
        let link = lookup("DISPATCH_DEEP_LINK_BASE")
            .ok_or_else(|| "DISPATCH_DEEP_LINK_BASE is not set".to_string())?;
        let mut cfg = Self::new(secret, link);

        if let Some(v) = lookup("DISPATCH_UTC_OFFSET_MINUTES") {
            cfg.utc_offset_minutes = parse_var("DISPATCH_UTC_OFFSET_MINUTES", &v)?;
        }
        if let Some(v) = lookup("DISPATCH_SWEEP_INTERVAL_SECS") {
            cfg.sweep_interval_secs = parse_var("DISPATCH_SWEEP_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = lookup("DISPATCH_TASK_OFFER_TTL_SECS") {
            cfg.task.offer_ttl_secs = parse_var("DISPATCH_TASK_OFFER_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("DISPATCH_ROUTE_OFFER_TTL_SECS") {
            cfg.route.offer_ttl_secs = parse_var("DISPATCH_ROUTE_OFFER_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("DISPATCH_STAGGER_MINS") {
            cfg.window.stagger_mins = parse_var("DISPATCH_STAGGER_MINS", &v)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{key} has invalid value `{value}`"))
}
