use thiserror::Error;

/// Failure to turn a single fingerprint key into graph records.
///
/// Scoped to one key: the assembler skips the key and keeps going.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Invalid fingerprint descriptor for device {device}: {reason}")]
    InvalidDescriptor { device: String, reason: String },

    #[error("No observation times for device {device}")]
    NoObservations { device: String },
}

/// Failure to write a mutation batch to the graph store.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Graph store rejected batch with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Graph store request failed: {0}")]
    Transport(String),

    #[error("Failed to encode mutation batch: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Graph submitter panicked: {0}")]
    Panicked(String),

    #[error("Submission writer is not running")]
    WriterUnavailable,
}
