//! In-memory outbox for development/testing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::error::NotifyError;
use crate::core::ports::NotificationChannel;
use crate::util::serde::ContactHandle;

/// A message handed to the outbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Recipient.
    pub handle: ContactHandle,
    /// Template name.
    pub template: String,
    /// Template variables.
    pub variables: BTreeMap<String, String>,
}

impl OutboundMessage {
    /// Look up a template variable.
    pub fn var(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }
}

/// Records every send. Can be switched into a failing mode to exercise
/// delivery errors.
#[derive(Default)]
pub struct InMemoryOutbox {
    sent: Mutex<Vec<OutboundMessage>>,
    failing: AtomicBool,
}

impl InMemoryOutbox {
    /// Create an outbox that accepts every send.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Messages delivered so far.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().clone()
    }

    /// Messages delivered to `handle`.
    pub fn sent_to(&self, handle: &ContactHandle) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.handle == *handle)
            .cloned()
            .collect()
    }

    /// Most recent message, if any.
    pub fn last(&self) -> Option<OutboundMessage> {
        self.sent.lock().last().cloned()
    }
}

#[async_trait]
impl NotificationChannel for InMemoryOutbox {
    async fn send(
        &self,
        handle: &ContactHandle,
        template: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError(format!("outbox unavailable for {handle}")));
        }
        self.sent.lock().push(OutboundMessage {
            handle: handle.clone(),
            template: template.to_string(),
            variables: variables.clone(),
        });
        Ok(())
    }
}
