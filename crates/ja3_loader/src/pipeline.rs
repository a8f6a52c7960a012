//! Hand-off from the broker consumer to the graph store.
//!
//! Decoded messages go into a bounded [`work_queue`], a pool of workers turns
//! each one into a mutation batch, and a single [`submission`] writer sends
//! the batches to the graph store one at a time.

pub mod submission;
pub mod work_queue;
pub mod worker_pool;

use anyhow::Context;
use ja3_domain::{DecodedMessage, GraphSubmitter};
use std::any::Any;
use std::sync::Arc;
use submission::{submission_channel, SubmissionWriter};
use tokio_util::sync::CancellationToken;
use tracing::info;
use work_queue::{work_queue, WorkQueueSender};
use worker_pool::{WorkerPool, WorkerPoolConfig};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    pub workers: usize,
    pub submission_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 50,
            workers: 5,
            submission_depth: 1,
        }
    }
}

pub struct Pipeline {
    pool: WorkerPool,
    writer: SubmissionWriter,
}

impl Pipeline {
    /// Build the pipeline and the sender the consumer enqueues into.
    pub fn new(
        config: PipelineConfig,
        submitter: Arc<dyn GraphSubmitter>,
    ) -> (Self, WorkQueueSender<DecodedMessage>) {
        let (sender, receiver) = work_queue(config.queue_capacity);
        let (submissions, writer) = submission_channel(submitter, config.submission_depth);
        let pool = WorkerPool::new(
            WorkerPoolConfig {
                workers: config.workers,
            },
            receiver,
            submissions,
        );

        (Self { pool, writer }, sender)
    }

    /// Run workers and the writer. Returns once every worker has stopped and
    /// the last batch has been submitted.
    pub async fn run(self, ctx: CancellationToken) -> anyhow::Result<()> {
        let writer = tokio::spawn(self.writer.run());

        self.pool.run(ctx).await?;
        writer.await.context("Submission writer task failed")?;

        info!("Pipeline stopped");
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
