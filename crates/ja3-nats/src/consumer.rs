use anyhow::{anyhow, Context, Result};
use async_nats::jetstream::{self, consumer::PullConsumer, AckKind, Message};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How often a message still being handled is reported as in progress, so
/// JetStream does not redeliver it while the handler waits on backpressure.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// Outcome for one delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Done with, never redeliver
    Ack,
    /// Redeliver later
    Nak(String),
}

/// Handles the payload of one message. The consumer settles the message with
/// the returned disposition as soon as the handler returns.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: Bytes) -> Disposition;
}

/// A delivered message that can be settled with the broker.
#[async_trait]
trait Delivery: Send + Sync {
    fn payload(&self) -> Bytes;
    async fn settle(&self, disposition: &Disposition) -> Result<()>;
    async fn in_progress(&self) -> Result<()>;
}

#[async_trait]
impl Delivery for Message {
    fn payload(&self) -> Bytes {
        self.payload.clone()
    }

    async fn settle(&self, disposition: &Disposition) -> Result<()> {
        let kind = match disposition {
            Disposition::Ack => AckKind::Ack,
            Disposition::Nak(_) => AckKind::Nak(None),
        };
        self.ack_with(kind).await.map_err(|e| anyhow!("{e}"))
    }

    async fn in_progress(&self) -> Result<()> {
        self.ack_with(AckKind::Progress)
            .await
            .map_err(|e| anyhow!("{e}"))
    }
}

/// Where and how to consume from JetStream.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub stream: String,
    /// Durable consumer name; NATS does not allow `.` in it
    pub consumer_name: String,
    pub subject_filter: String,
    pub batch_size: usize,
    pub max_wait: Duration,
}

/// Durable JetStream pull consumer handing each message to a [`MessageHandler`].
pub struct NatsConsumer {
    consumer: PullConsumer,
    batch_size: usize,
    max_wait: Duration,
    handler: Arc<dyn MessageHandler>,
}

impl NatsConsumer {
    pub async fn new(
        jetstream: &jetstream::Context,
        config: ConsumerConfig,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Self> {
        debug!(
            stream = %config.stream,
            consumer = %config.consumer_name,
            subject = %config.subject_filter,
            "Creating JetStream consumer"
        );

        let consumer = jetstream
            .create_consumer_on_stream(
                jetstream::consumer::pull::Config {
                    name: Some(config.consumer_name.clone()),
                    durable_name: Some(config.consumer_name.clone()),
                    filter_subject: config.subject_filter.clone(),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
                config.stream.as_str(),
            )
            .await
            .context("Failed to create consumer")?;

        info!(
            stream = %config.stream,
            consumer = %config.consumer_name,
            "Consumer created"
        );

        Ok(Self {
            consumer,
            batch_size: config.batch_size,
            max_wait: config.max_wait,
            handler,
        })
    }

    /// Fetch and dispatch until cancelled. Cancellation is only observed
    /// while waiting for a fetch; a fetched batch is always settled.
    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        info!("Starting consumer loop");

        loop {
            let fetched = tokio::select! {
                biased;
                _ = ctx.cancelled() => break,
                fetched = self.fetch() => fetched,
            };

            match fetched {
                Ok(messages) => dispatch(self.handler.as_ref(), messages, &ctx).await,
                Err(e) => {
                    error!(error = format!("{e:#}"), "Failed to fetch batch");
                    tokio::select! {
                        _ = ctx.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                }
            }
        }

        info!("Consumer stopped");
        Ok(())
    }

    async fn fetch(&self) -> Result<Vec<Message>> {
        let mut batch = self
            .consumer
            .fetch()
            .max_messages(self.batch_size)
            .expires(self.max_wait)
            .messages()
            .await
            .context("Failed to fetch messages")?;

        let mut messages = Vec::new();
        while let Some(next) = batch.next().await {
            match next {
                Ok(message) => messages.push(message),
                Err(e) => warn!(error = %e, "Error receiving message from batch"),
            }
        }
        Ok(messages)
    }
}

/// Hand each delivery to the handler in order and settle it straight away.
/// Once `ctx` is cancelled the remaining deliveries are nak'd unhandled.
async fn dispatch<D: Delivery>(
    handler: &dyn MessageHandler,
    deliveries: Vec<D>,
    ctx: &CancellationToken,
) {
    if deliveries.is_empty() {
        return;
    }
    debug!(message_count = deliveries.len(), "Dispatching batch");

    for (index, delivery) in deliveries.iter().enumerate() {
        let disposition = if ctx.is_cancelled() {
            Disposition::Nak("consumer shutting down".to_string())
        } else {
            handle_with_progress(handler, delivery).await
        };

        if let Disposition::Nak(reason) = &disposition {
            warn!(message_index = index, reason = %reason, "Rejecting message for redelivery");
        }
        if let Err(e) = delivery.settle(&disposition).await {
            error!(error = %e, message_index = index, "Failed to settle message");
        }
    }
}

async fn handle_with_progress<D: Delivery>(
    handler: &dyn MessageHandler,
    delivery: &D,
) -> Disposition {
    let handling = handler.handle(delivery.payload());
    tokio::pin!(handling);

    let mut ticks = interval_at(Instant::now() + PROGRESS_INTERVAL, PROGRESS_INTERVAL);
    loop {
        tokio::select! {
            disposition = &mut handling => return disposition,
            _ = ticks.tick() => {
                if let Err(e) = delivery.in_progress().await {
                    warn!(error = %e, "Failed to extend ack deadline");
                }
            }
        }
    }
}
