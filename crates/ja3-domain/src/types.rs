use crate::error::TransformError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Composite key of one aggregated observation group.
///
/// On the wire this is the pair `[device, descriptor]`, where `descriptor` is an
/// embedded JSON document describing the TLS client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct FingerprintKey {
    pub device: String,
    pub descriptor: String,
}

impl FingerprintKey {
    pub fn new(device: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            descriptor: descriptor.into(),
        }
    }

    /// Parse the embedded descriptor document.
    pub fn parse_descriptor(&self) -> Result<FingerprintDescriptor, TransformError> {
        serde_json::from_str(&self.descriptor).map_err(|e| TransformError::InvalidDescriptor {
            device: self.device.clone(),
            reason: e.to_string(),
        })
    }
}

impl From<(String, String)> for FingerprintKey {
    fn from((device, descriptor): (String, String)) -> Self {
        Self { device, descriptor }
    }
}

impl From<FingerprintKey> for (String, String) {
    fn from(key: FingerprintKey) -> Self {
        (key.device, key.descriptor)
    }
}

/// The parts of a fingerprint descriptor the loader cares about.
/// Other fields produced upstream are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FingerprintDescriptor {
    /// Source endpoint, `ip:port`.
    pub src: String,
    pub ja3digest: String,
}

/// Observations folded into one fingerprint key during an aggregation window.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ObservationGroup {
    /// Epoch timestamps of the individual observations, in no particular order.
    pub times: Vec<i64>,
    pub count: i64,
}

/// One decoded broker message: every observation group of a window.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    /// When the upstream window emitted the message. Only used for latency logging.
    pub sent_at: DateTime<Utc>,
    pub observations: Vec<(FingerprintKey, ObservationGroup)>,
}

impl DecodedMessage {
    pub fn new(
        sent_at: DateTime<Utc>,
        observations: Vec<(FingerprintKey, ObservationGroup)>,
    ) -> Self {
        Self {
            sent_at,
            observations,
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}
