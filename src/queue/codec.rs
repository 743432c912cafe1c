//! JSON encoding of measurements on the queue
//!
//! Field names are part of the contract between the checker and the notifier, see
//! [`Measurement`](crate::Measurement).

use crate::Measurement;

use super::{QueueError, QueueResult};

pub const CONTENT_TYPE: &str = "application/json";

pub fn encode(measurement: &Measurement) -> QueueResult<Vec<u8>> {
    serde_json::to_vec(measurement).map_err(|e| QueueError::Encode(e.to_string()))
}

pub fn decode(body: &[u8]) -> QueueResult<Measurement> {
    serde_json::from_slice(body).map_err(|e| QueueError::Decode(e.to_string()))
}
