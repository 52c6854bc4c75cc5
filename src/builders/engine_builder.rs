//! Builder wiring a [`DispatchEngine`] from configuration and collaborators.

use std::sync::Arc;

use crate::config::DispatchConfig;
use crate::core::audit::AuditSink;
use crate::core::context::DispatchContext;
use crate::core::engine::DispatchEngine;
use crate::core::error::DispatchError;
use crate::core::ports::{AdminAlertSink, AssignmentSync, DispatchStore, DriverDirectory, NotificationChannel};
use crate::core::token::{HmacTokenCodec, TokenCodec};
use crate::infra::{InMemoryAlertSink, InMemoryDirectory, InMemoryOutbox, InMemoryStore};
use crate::util::clock::{Clock, SystemClock};

/// Assembles a [`DispatchEngine`].
///
/// Collaborators left unset fall back to the in-memory adapters, the system
/// clock and an HMAC codec keyed with `config.token_secret`.
pub struct EngineBuilder {
    config: DispatchConfig,
    store: Option<Arc<dyn DispatchStore>>,
    directory: Option<Arc<dyn DriverDirectory>>,
    notifier: Option<Arc<dyn NotificationChannel>>,
    alerts: Option<Arc<dyn AdminAlertSink>>,
    tokens: Option<Arc<dyn TokenCodec>>,
    clock: Option<Arc<dyn Clock>>,
    sync: Option<Arc<dyn AssignmentSync>>,
    audit: Option<Box<dyn AuditSink>>,
}

impl EngineBuilder {
    /// Start from a configuration.
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            store: None,
            directory: None,
            notifier: None,
            alerts: None,
            tokens: None,
            clock: None,
            sync: None,
            audit: None,
        }
    }

    /// Persistence backend.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn DispatchStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Driver pool.
    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn DriverDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Outbound messaging.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationChannel>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Escalation target.
    #[must_use]
    pub fn with_alerts(mut self, alerts: Arc<dyn AdminAlertSink>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    /// Token codec.
    #[must_use]
    pub fn with_tokens(mut self, tokens: Arc<dyn TokenCodec>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// External dispatch integration.
    #[must_use]
    pub fn with_sync(mut self, sync: Arc<dyn AssignmentSync>) -> Self {
        self.sync = Some(sync);
        self
    }

    /// Audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Validate configuration and build the context only.
    pub fn build_context(self) -> Result<DispatchContext, DispatchError> {
        self.config.validate().map_err(DispatchError::Config)?;
        let tokens = self
            .tokens
            .unwrap_or_else(|| Arc::new(HmacTokenCodec::new(self.config.token_secret.as_bytes())));
        let mut ctx = DispatchContext::new(
            self.config,
            self.store.unwrap_or_else(|| Arc::new(InMemoryStore::new())),
            self.directory
                .unwrap_or_else(|| Arc::new(InMemoryDirectory::new())),
            self.notifier.unwrap_or_else(|| Arc::new(InMemoryOutbox::new())),
            self.alerts.unwrap_or_else(|| Arc::new(InMemoryAlertSink::new())),
            tokens,
            self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        )?;
        if let Some(sync) = self.sync {
            ctx = ctx.with_sync(sync);
        }
        if let Some(audit) = self.audit {
            ctx = ctx.with_audit(audit);
        }
        Ok(ctx)
    }

    /// Validate configuration and assemble the engine.
    pub fn build(self) -> Result<DispatchEngine, DispatchError> {
        self.build_context().map(DispatchEngine::new)
    }
}
