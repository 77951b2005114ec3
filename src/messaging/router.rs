//! Delivery of messages to component sinks.
//!
//! The router is stateless with respect to the component set: callers hand
//! it the recipients resolved from the registry, so a delivery in progress is
//! never blocked by (or blocking) a hot-swap.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, warn};

use super::message::{ComponentMessage, Destination};
use crate::component::{ComponentError, ComponentId, ComponentStatus, Payload};
use crate::telemetry;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Message delivery to {destination} failed: {reason}")]
    MessageDeliveryFailed { destination: String, reason: String },
}

/// Anything that can receive a routed message.
#[async_trait]
pub trait MessageSink: Send + Sync {
    fn id(&self) -> &ComponentId;

    fn status(&self) -> ComponentStatus;

    async fn deliver(&self, message: &ComponentMessage) -> Result<Option<Payload>, ComponentError>;
}

/// One recipient that did not get a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub recipient: ComponentId,
    pub reason: String,
}

/// Outcome of a broadcast fan-out.
#[derive(Debug, Clone, Default)]
pub struct BroadcastReport {
    pub delivered: Vec<ComponentId>,
    pub failed: Vec<DeliveryFailure>,
}

impl BroadcastReport {
    pub fn delivered_to(&self, id: &ComponentId) -> bool {
        self.delivered.contains(id)
    }
}

/// Delivery counters since router creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub delivered: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// Routes messages to already-resolved sinks.
#[derive(Debug, Default)]
pub struct MessageRouter {
    delivered: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver to a single destination. `target` is `None` when the
    /// destination is not loaded, which is a hard failure.
    pub async fn send(
        &self,
        message: &ComponentMessage,
        target: Option<Arc<dyn MessageSink>>,
    ) -> Result<Option<ComponentMessage>, RouterError> {
        let destination = match &message.destination {
            Destination::Component(id) => id.to_string(),
            Destination::Broadcast => "broadcast".to_string(),
        };

        let Some(sink) = target else {
            return Err(self.fail(destination, "destination not loaded".to_string()));
        };

        let status = sink.status();
        if !status.accepts_messages() {
            return Err(self.fail(destination, format!("destination is {}", status)));
        }

        match sink.deliver(message).await {
            Ok(reply) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                telemetry::record_message("delivered");
                Ok(reply.map(|payload| message.reply(sink.id(), payload)))
            }
            Err(e) => Err(self.fail(destination, e.to_string())),
        }
    }

    /// Fan out to every recipient concurrently. Failures are logged and
    /// skipped; they never prevent delivery to the others.
    pub async fn broadcast(
        &self,
        message: &ComponentMessage,
        recipients: Vec<Arc<dyn MessageSink>>,
    ) -> BroadcastReport {
        let deliveries = recipients.into_iter().map(|sink| async move {
            let status = sink.status();
            if !status.accepts_messages() {
                return (sink.id().clone(), Err(format!("recipient is {}", status)));
            }
            let result = sink.deliver(message).await.map(|_| ()).map_err(|e| e.to_string());
            (sink.id().clone(), result)
        });

        let mut report = BroadcastReport::default();
        for (recipient, result) in join_all(deliveries).await {
            match result {
                Ok(()) => {
                    self.delivered.fetch_add(1, Ordering::Relaxed);
                    telemetry::record_message("delivered");
                    report.delivered.push(recipient);
                }
                Err(reason) => {
                    self.skipped.fetch_add(1, Ordering::Relaxed);
                    telemetry::record_message("skipped");
                    warn!(
                        message_id = %message.id,
                        recipient = %recipient,
                        reason = %reason,
                        "broadcast delivery skipped"
                    );
                    report.failed.push(DeliveryFailure { recipient, reason });
                }
            }
        }

        debug!(
            message_id = %message.id,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "broadcast complete"
        );
        report
    }

    pub fn stats(&self) -> RouterStats {
        RouterStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }

    fn fail(&self, destination: String, reason: String) -> RouterError {
        self.failed.fetch_add(1, Ordering::Relaxed);
        telemetry::record_message("failed");
        RouterError::MessageDeliveryFailed { destination, reason }
    }
}
