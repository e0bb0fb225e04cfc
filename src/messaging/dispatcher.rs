use super::message::WorkEvent;
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use tokio::sync::broadcast;
use tracing::debug;

/// Hands work items to the transport that carries them to workers.
///
/// Delivery guarantees, backpressure and transport-level retries belong to
/// the implementation.
#[async_trait]
pub trait WorkDispatcher: Send + Sync + fmt::Debug {
    async fn dispatch(&self, event: WorkEvent) -> Result<()>;
}

/// In-process dispatcher over a broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastWorkDispatcher {
    sender: broadcast::Sender<WorkEvent>,
}

impl BroadcastWorkDispatcher {
    /// Create a new dispatcher with the specified channel capacity. A
    /// capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastWorkDispatcher {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl WorkDispatcher for BroadcastWorkDispatcher {
    async fn dispatch(&self, event: WorkEvent) -> Result<()> {
        let event_id = event.context().event_id.clone();
        // send() only fails when nobody is subscribed, which is fine here
        match self.sender.send(event) {
            Ok(receivers) => debug!(event_id = %event_id, receivers, "Dispatched work event"),
            Err(broadcast::error::SendError(_)) => {
                debug!(event_id = %event_id, "Dispatched work event with no subscribers")
            }
        }
        Ok(())
    }
}
