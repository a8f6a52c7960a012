use crate::elements::MutationBatch;
use crate::error::TransformError;
use crate::transformer::{build_edge, build_entity, earliest_time};
use crate::types::{DecodedMessage, FingerprintKey, ObservationGroup};
use tracing::{debug, warn};

/// Result of assembling one message: the batch to submit plus the keys that were dropped.
#[derive(Debug, Default)]
pub struct AssembledBatch {
    pub batch: MutationBatch,
    pub skipped: Vec<TransformError>,
}

/// Build the entity and edge records for every fingerprint key in a message.
///
/// Each key contributes an entity followed by its edge. A key whose descriptor
/// cannot be parsed, or that has no observation times, is logged and skipped
/// without affecting the rest of the message.
pub fn assemble_batch(message: &DecodedMessage) -> AssembledBatch {
    let mut assembled = AssembledBatch::default();

    for (key, group) in &message.observations {
        match assemble_key(key, group, &mut assembled.batch) {
            Ok(()) => {}
            Err(e) => {
                warn!(device = %key.device, error = %e, "Skipping fingerprint key");
                assembled.skipped.push(e);
            }
        }
    }

    debug!(
        keys = message.len(),
        elements = assembled.batch.len(),
        skipped = assembled.skipped.len(),
        "Assembled mutation batch"
    );

    assembled
}

fn assemble_key(
    key: &FingerprintKey,
    group: &ObservationGroup,
    batch: &mut MutationBatch,
) -> Result<(), TransformError> {
    let descriptor = key.parse_descriptor()?;
    let earliest = earliest_time(&group.times).ok_or_else(|| TransformError::NoObservations {
        device: key.device.clone(),
    })?;

    batch.push(build_entity(&descriptor.ja3digest, earliest));
    batch.push(build_edge(
        &key.device,
        &descriptor.ja3digest,
        earliest,
        group.count,
    ));
    Ok(())
}
