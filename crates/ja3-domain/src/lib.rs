pub mod assembler;
pub mod elements;
pub mod error;
pub mod submitter;
pub mod transformer;
pub mod types;

pub use assembler::{assemble_batch, AssembledBatch};
pub use elements::*;
pub use error::{SubmitError, TransformError};
pub use submitter::{DiscardSubmitter, GraphSubmitter};
pub use transformer::{build_edge, build_entity, earliest_time};
pub use types::*;

#[cfg(any(test, feature = "testing"))]
pub use submitter::MockGraphSubmitter;
