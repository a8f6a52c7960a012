//! Wire format of the windowed observation messages.
//!
//! Each message is a JSON pair `[sent_at, observations]` where `sent_at` is
//! epoch seconds (fractional) and `observations` is a list of
//! `[[device, descriptor], {"times": [...], "count": n}]` entries.

use chrono::{DateTime, Utc};
use ja3_domain::{DecodedMessage, FingerprintKey, ObservationGroup};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("Malformed envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid send timestamp: {0}")]
    InvalidTimestamp(f64),
}

#[derive(Deserialize)]
struct WireEnvelope(f64, Vec<(FingerprintKey, ObservationGroup)>);

pub fn decode_envelope(payload: &[u8]) -> Result<DecodedMessage, EnvelopeError> {
    let WireEnvelope(sent_at, observations) = serde_json::from_slice(payload)?;
    Ok(DecodedMessage::new(to_datetime(sent_at)?, observations))
}

fn to_datetime(epoch_secs: f64) -> Result<DateTime<Utc>, EnvelopeError> {
    if !epoch_secs.is_finite() {
        return Err(EnvelopeError::InvalidTimestamp(epoch_secs));
    }
    DateTime::from_timestamp_micros((epoch_secs * 1_000_000.0) as i64)
        .ok_or(EnvelopeError::InvalidTimestamp(epoch_secs))
}
