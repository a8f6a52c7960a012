use crate::elements::MutationBatch;
use crate::error::SubmitError;
use async_trait::async_trait;
use tracing::debug;

/// Writes a mutation batch to the graph store as one bulk operation.
///
/// Implementations must not retry: a failed batch is reported to the caller,
/// which logs and drops it.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait GraphSubmitter: Send + Sync {
    async fn submit(&self, batch: &MutationBatch) -> Result<(), SubmitError>;
}

/// Submitter used when no graph store is configured: batches are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSubmitter;

#[async_trait]
impl GraphSubmitter for DiscardSubmitter {
    async fn submit(&self, batch: &MutationBatch) -> Result<(), SubmitError> {
        debug!(elements = batch.len(), "Transform-only mode, discarding batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformer::build_entity;

    #[tokio::test]
    async fn test_discard_submitter_always_succeeds() {
        let mut batch = MutationBatch::new();
        batch.push(build_entity("abc123", 50));

        assert!(DiscardSubmitter.submit(&batch).await.is_ok());
        assert!(DiscardSubmitter.submit(&MutationBatch::new()).await.is_ok());
    }
}
