use super::panic_message;
use super::submission::SubmissionHandle;
use super::work_queue::WorkQueueReceiver;
use chrono::Utc;
use futures::FutureExt;
use ja3_domain::{assemble_batch, DecodedMessage};
use std::panic::AssertUnwindSafe;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub workers: usize,
}

/// Fixed set of workers pulling decoded messages off the work queue.
pub struct WorkerPool {
    config: WorkerPoolConfig,
    queue: WorkQueueReceiver<DecodedMessage>,
    submissions: SubmissionHandle,
}

impl WorkerPool {
    pub fn new(
        config: WorkerPoolConfig,
        queue: WorkQueueReceiver<DecodedMessage>,
        submissions: SubmissionHandle,
    ) -> Self {
        Self {
            config,
            queue,
            submissions,
        }
    }

    /// Run every worker until cancellation, then let each drain what is left
    /// in the queue before returning.
    pub async fn run(self, ctx: CancellationToken) -> anyhow::Result<()> {
        let mut workers = JoinSet::new();
        for id in 0..self.config.workers {
            let worker = Worker {
                id,
                queue: self.queue.clone(),
                submissions: self.submissions.clone(),
            };
            workers.spawn(worker.run(ctx.clone()));
        }

        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Worker task failed");
            }
        }

        // Anything enqueued after the last worker's drain would otherwise be
        // acked and lost. Close first so the consumer naks late arrivals.
        self.queue.close().await;
        let last = Worker {
            id: self.config.workers,
            queue: self.queue,
            submissions: self.submissions,
        };
        let stragglers = last.drain().await;

        info!(stragglers, "All workers stopped");
        Ok(())
    }
}

struct Worker {
    id: usize,
    queue: WorkQueueReceiver<DecodedMessage>,
    submissions: SubmissionHandle,
}

impl Worker {
    async fn run(self, ctx: CancellationToken) {
        info!(worker = self.id, "Processor starting");

        loop {
            let message = tokio::select! {
                biased;
                _ = ctx.cancelled() => break,
                message = self.queue.dequeue() => message,
            };

            match message {
                Some(message) => self.process_guarded(message).await,
                None => {
                    info!(worker = self.id, "Work queue closed, processor stopping");
                    return;
                }
            }
        }

        let drained = self.drain().await;
        info!(worker = self.id, drained, "Processor stopping");
    }

    async fn drain(&self) -> usize {
        let mut drained = 0;
        while let Some(message) = self.queue.try_dequeue().await {
            self.process_guarded(message).await;
            drained += 1;
        }
        drained
    }

    /// A panic while processing costs the message, not the worker.
    async fn process_guarded(&self, message: DecodedMessage) {
        let processing = async { self.process(message).await };
        if let Err(panic) = AssertUnwindSafe(processing).catch_unwind().await {
            error!(
                worker = self.id,
                panic = panic_message(panic.as_ref()),
                "Processing panicked, dropping message"
            );
        }
    }

    async fn process(&self, message: DecodedMessage) {
        let latency_ms = (Utc::now() - message.sent_at).num_milliseconds();
        debug!(
            worker = self.id,
            keys = message.len(),
            latency_ms,
            "Processing message"
        );

        let assembled = assemble_batch(&message);
        if !assembled.skipped.is_empty() {
            warn!(
                worker = self.id,
                skipped = assembled.skipped.len(),
                "Some fingerprint keys could not be transformed"
            );
        }

        if assembled.batch.is_empty() {
            debug!(worker = self.id, "Nothing to submit");
            return;
        }

        let elements = assembled.batch.len();
        match self.submissions.submit(assembled.batch).await {
            Ok(()) => debug!(worker = self.id, elements, "Batch submitted"),
            Err(e) => error!(
                worker = self.id,
                elements,
                error = %e,
                "Gaffer error, dropping batch"
            ),
        }
    }
}
