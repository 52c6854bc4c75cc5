//! Shared collaborators handed to every dispatch component.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use parking_lot::Mutex;

use crate::config::DispatchConfig;
use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::error::DispatchError;
use crate::core::model::Job;
use crate::core::ports::{AdminAlertSink, AssignmentSync, DispatchStore, DriverDirectory, NotificationChannel};
use crate::core::token::TokenCodec;
use crate::core::window::{TimeWindow, WindowPolicy};
use crate::util::clock::Clock;
use crate::util::serde::{DriverId, JobId, OfferId};

/// Collaborators and resolved configuration shared by the components.
///
/// Cloning is cheap: everything is reference counted.
#[derive(Clone)]
pub struct DispatchContext {
    pub(crate) config: Arc<DispatchConfig>,
    pub(crate) policy: WindowPolicy,
    pub(crate) offset: FixedOffset,
    pub(crate) store: Arc<dyn DispatchStore>,
    pub(crate) directory: Arc<dyn DriverDirectory>,
    pub(crate) notifier: Arc<dyn NotificationChannel>,
    pub(crate) alerts: Arc<dyn AdminAlertSink>,
    pub(crate) tokens: Arc<dyn TokenCodec>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) sync: Option<Arc<dyn AssignmentSync>>,
    pub(crate) audit: Option<Arc<Mutex<Box<dyn AuditSink>>>>,
}

impl DispatchContext {
    /// Assemble a context, validating configuration.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: DispatchConfig,
        store: Arc<dyn DispatchStore>,
        directory: Arc<dyn DriverDirectory>,
        notifier: Arc<dyn NotificationChannel>,
        alerts: Arc<dyn AdminAlertSink>,
        tokens: Arc<dyn TokenCodec>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DispatchError> {
        config.validate().map_err(DispatchError::Config)?;
        let offset = config
            .local_offset()
            .ok_or_else(|| DispatchError::Config("utc offset out of range".into()))?;
        Ok(Self {
            policy: WindowPolicy::from_config(&config.window),
            offset,
            config: Arc::new(config),
            store,
            directory,
            notifier,
            alerts,
            tokens,
            clock,
            sync: None,
            audit: None,
        })
    }

    /// Attach an external assignment integration.
    #[must_use]
    pub fn with_sync(mut self, sync: Arc<dyn AssignmentSync>) -> Self {
        self.sync = Some(sync);
        self
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(Arc::new(Mutex::new(audit)));
        self
    }

    /// Engine configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Resolved window geometry.
    pub const fn policy(&self) -> &WindowPolicy {
        &self.policy
    }

    /// Current time from the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Start of the job's part after applying the stagger.
    pub fn part_start(&self, job: &Job) -> Result<DateTime<Utc>, DispatchError> {
        self.policy
            .part_start(job.scheduled_start, job.unit_index)
            .ok_or_else(|| DispatchError::OutOfRange {
                job: job.id.clone(),
                what: "part start",
            })
    }

    /// Blocked window of the job's part.
    pub fn job_window(&self, job: &Job) -> Result<TimeWindow, DispatchError> {
        self.policy
            .blocked_for_unit(job.scheduled_start, job.unit_index)
            .ok_or_else(|| DispatchError::OutOfRange {
                job: job.id.clone(),
                what: "blocked window",
            })
    }

    /// Record an audit event (sync operation with parking_lot mutex).
    pub(crate) fn record(
        &self,
        job_id: &JobId,
        offer_id: Option<OfferId>,
        driver_id: Option<&DriverId>,
        action: AuditAction,
        detail: Option<String>,
    ) {
        if let Some(audit_sink) = &self.audit {
            let mut sink = audit_sink.lock();
            sink.record(build_audit_event(
                job_id,
                offer_id,
                driver_id,
                action,
                self.clock.now(),
                detail,
            ));
        }
    }
}
