//! In-memory alert sink.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::error::DispatchError;
use crate::core::ports::{AdminAlertSink, AlertContext};

/// Collects alerts for inspection.
#[derive(Default)]
pub struct InMemoryAlertSink {
    alerts: Mutex<Vec<AlertContext>>,
}

impl InMemoryAlertSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts raised so far.
    pub fn alerts(&self) -> Vec<AlertContext> {
        self.alerts.lock().clone()
    }

    /// Number of alerts raised.
    pub fn len(&self) -> usize {
        self.alerts.lock().len()
    }

    /// Whether no alert was raised.
    pub fn is_empty(&self) -> bool {
        self.alerts.lock().is_empty()
    }
}

#[async_trait]
impl AdminAlertSink for InMemoryAlertSink {
    async fn notify(&self, alert: &AlertContext) -> Result<(), DispatchError> {
        self.alerts.lock().push(alert.clone());
        Ok(())
    }
}
