use crate::pipeline::work_queue::WorkQueueSender;
use async_trait::async_trait;
use bytes::Bytes;
use ja3_domain::DecodedMessage;
use ja3_nats::{decode_envelope, Disposition, MessageHandler};
use tracing::{debug, error, warn};

/// What happened to one broker payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Decoded and placed on the work queue
    Enqueued,
    /// Could not be decoded; redelivery would fail the same way
    Dropped,
    /// The workers are gone; the payload should be redelivered
    QueueClosed,
}

impl From<ReceiveOutcome> for Disposition {
    fn from(outcome: ReceiveOutcome) -> Self {
        match outcome {
            ReceiveOutcome::Enqueued | ReceiveOutcome::Dropped => Disposition::Ack,
            ReceiveOutcome::QueueClosed => Disposition::Nak("work queue closed".to_string()),
        }
    }
}

/// Decodes broker payloads and feeds them to the work queue.
#[derive(Clone)]
pub struct MessageReceiver {
    queue: WorkQueueSender<DecodedMessage>,
}

impl MessageReceiver {
    pub fn new(queue: WorkQueueSender<DecodedMessage>) -> Self {
        Self { queue }
    }

    /// Decode one payload and enqueue it, waiting while the queue is full.
    pub async fn receive(&self, payload: &[u8]) -> ReceiveOutcome {
        let message = match decode_envelope(payload) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, bytes = payload.len(), "Failed to decode message, dropping");
                return ReceiveOutcome::Dropped;
            }
        };

        debug!(keys = message.len(), sent_at = %message.sent_at, "Received message");

        match self.queue.enqueue(message).await {
            Ok(()) => ReceiveOutcome::Enqueued,
            Err(e) => {
                warn!(error = %e, "Could not enqueue message");
                ReceiveOutcome::QueueClosed
            }
        }
    }
}

#[async_trait]
impl MessageHandler for MessageReceiver {
    async fn handle(&self, payload: Bytes) -> Disposition {
        self.receive(&payload).await.into()
    }
}
