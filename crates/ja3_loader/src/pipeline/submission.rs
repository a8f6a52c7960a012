use super::panic_message;
use futures::FutureExt;
use ja3_domain::{GraphSubmitter, MutationBatch, SubmitError};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

struct SubmissionRequest {
    batch: MutationBatch,
    reply: oneshot::Sender<Result<(), SubmitError>>,
}

/// Create the writer and the handle workers use to reach it.
///
/// All batches go through the one writer task, so at most one graph store
/// request is in flight no matter how many workers are running.
pub fn submission_channel(
    submitter: Arc<dyn GraphSubmitter>,
    depth: usize,
) -> (SubmissionHandle, SubmissionWriter) {
    let (tx, rx) = mpsc::channel(depth);
    (SubmissionHandle { tx }, SubmissionWriter { rx, submitter })
}

#[derive(Clone)]
pub struct SubmissionHandle {
    tx: mpsc::Sender<SubmissionRequest>,
}

impl SubmissionHandle {
    /// Hand a batch to the writer and wait for its outcome.
    pub async fn submit(&self, batch: MutationBatch) -> Result<(), SubmitError> {
        let (reply, outcome) = oneshot::channel();
        self.tx
            .send(SubmissionRequest { batch, reply })
            .await
            .map_err(|_| SubmitError::WriterUnavailable)?;
        outcome.await.map_err(|_| SubmitError::WriterUnavailable)?
    }
}

pub struct SubmissionWriter {
    rx: mpsc::Receiver<SubmissionRequest>,
    submitter: Arc<dyn GraphSubmitter>,
}

impl SubmissionWriter {
    /// Serve requests until every handle has been dropped.
    pub async fn run(mut self) {
        info!("Submission writer started");

        while let Some(SubmissionRequest { batch, reply }) = self.rx.recv().await {
            let submission = async { self.submitter.submit(&batch).await };
            let result = match AssertUnwindSafe(submission).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    let reason = panic_message(panic.as_ref()).to_string();
                    error!(panic = %reason, "Graph submitter panicked");
                    Err(SubmitError::Panicked(reason))
                }
            };
            if reply.send(result).is_err() {
                debug!("Submitter caller went away before the result arrived");
            }
        }

        info!("Submission writer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ja3_domain::{build_entity, MockGraphSubmitter};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct SlowSubmitter {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GraphSubmitter for SlowSubmitter {
        async fn submit(&self, _batch: &MutationBatch) -> Result<(), SubmitError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn batch(digest: &str) -> MutationBatch {
        let mut batch = MutationBatch::new();
        batch.push(build_entity(digest, 1));
        batch
    }

    #[tokio::test]
    async fn test_one_submission_in_flight() {
        let submitter = Arc::new(SlowSubmitter::default());
        let (handle, writer) = submission_channel(submitter.clone(), 1);
        let writer = tokio::spawn(writer.run());

        let callers: Vec<_> = (0..5)
            .map(|i| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.submit(batch(&format!("d{i}"))).await })
            })
            .collect();
        for caller in callers {
            caller.await.unwrap().unwrap();
        }

        drop(handle);
        writer.await.unwrap();

        assert_eq!(submitter.calls.load(Ordering::SeqCst), 5);
        assert_eq!(submitter.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejection_reaches_caller() {
        let mut mock = MockGraphSubmitter::new();
        mock.expect_submit().times(1).returning(|_| {
            Err(SubmitError::Rejected {
                status: 500,
                body: "server error".to_string(),
            })
        });

        let (handle, writer) = submission_channel(Arc::new(mock), 1);
        tokio::spawn(writer.run());

        let result = handle.submit(batch("abc123")).await;
        assert!(matches!(
            result,
            Err(SubmitError::Rejected { status: 500, .. })
        ));
    }

    /// Panics on its first call, succeeds afterwards.
    #[derive(Default)]
    struct PanicOnceSubmitter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GraphSubmitter for PanicOnceSubmitter {
        async fn submit(&self, _batch: &MutationBatch) -> Result<(), SubmitError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("graph client bug");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_writer_survives_submitter_panic() {
        let submitter = Arc::new(PanicOnceSubmitter::default());
        let (handle, writer) = submission_channel(submitter.clone(), 1);
        let writer = tokio::spawn(writer.run());

        let first = handle.submit(batch("abc123")).await;
        assert!(matches!(first, Err(SubmitError::Panicked(ref m)) if m == "graph client bug"));
        assert!(handle.submit(batch("def456")).await.is_ok());

        drop(handle);
        writer.await.unwrap();
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_writer_gone() {
        let (handle, writer) = submission_channel(Arc::new(MockGraphSubmitter::new()), 1);
        drop(writer);

        let result = handle.submit(batch("abc123")).await;
        assert!(matches!(result, Err(SubmitError::WriterUnavailable)));
    }
}
