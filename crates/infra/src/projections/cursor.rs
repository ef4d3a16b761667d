//! Per-stream cursors and the shared projection contract.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockbook_core::AggregateId;
use stockbook_events::EventEnvelope;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("failed to deserialize event: {0}")]
    Deserialize(String),

    /// The payload names a different aggregate than the envelope it came in.
    #[error("stream mismatch: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Last applied sequence number per aggregate stream.
///
/// Envelopes at or below the cursor are duplicates (at-least-once delivery)
/// and are skipped. A jump past `last + 1` on a stream that has already been
/// seen is a gap and is rejected.
#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self, aggregate_id: AggregateId) -> u64 {
        match self.inner.read() {
            Ok(c) => c.get(&aggregate_id).copied().unwrap_or(0),
            Err(_) => 0,
        }
    }

    /// `Ok(true)` when `envelope` is the next event of its stream.
    pub fn should_apply<E>(&self, envelope: &EventEnvelope<E>) -> Result<bool, ProjectionError> {
        let seq = envelope.sequence_number();
        let last = self.last(envelope.aggregate_id());

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(false);
        }
        if seq != last + 1 && last != 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(true)
    }

    pub fn advance(&self, aggregate_id: AggregateId, sequence_number: u64) {
        if let Ok(mut c) = self.inner.write() {
            c.insert(aggregate_id, sequence_number);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut c) = self.inner.write() {
            c.clear();
        }
    }
}

/// Decode the JSON payload of `envelope` into a domain event type.
pub fn decode<E: DeserializeOwned>(envelope: &EventEnvelope<JsonValue>) -> Result<E, ProjectionError> {
    serde_json::from_value(envelope.payload().clone())
        .map_err(|e| ProjectionError::Deserialize(e.to_string()))
}

/// Reject a payload whose aggregate id differs from the envelope's.
pub fn ensure_stream(
    envelope: &EventEnvelope<JsonValue>,
    payload_id: AggregateId,
) -> Result<(), ProjectionError> {
    if payload_id != envelope.aggregate_id() {
        return Err(ProjectionError::StreamMismatch(format!(
            "payload id {payload_id} does not match envelope aggregate_id {}",
            envelope.aggregate_id()
        )));
    }
    Ok(())
}

/// A rebuildable, idempotent read-model builder.
///
/// Envelopes of other aggregate types are ignored.
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;

    /// Drop the read model and every cursor.
    fn reset(&self);

    /// Reset, then replay `envelopes` in commit order.
    fn rebuild_from_scratch(&self, envelopes: &[EventEnvelope<JsonValue>]) -> Result<(), ProjectionError> {
        self.reset();
        for env in envelopes {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn env(aggregate_id: AggregateId, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(Uuid::now_v7(), aggregate_id, "t", seq, JsonValue::Null)
    }

    #[test]
    fn next_in_stream_is_applied_and_duplicates_skipped() {
        let cursors = StreamCursors::new();
        let id = AggregateId::new();

        assert_eq!(cursors.should_apply(&env(id, 1)), Ok(true));
        cursors.advance(id, 1);
        assert_eq!(cursors.should_apply(&env(id, 1)), Ok(false));
        assert_eq!(cursors.should_apply(&env(id, 2)), Ok(true));
    }

    #[test]
    fn gaps_and_zero_are_rejected() {
        let cursors = StreamCursors::new();
        let id = AggregateId::new();
        cursors.advance(id, 1);

        assert_eq!(
            cursors.should_apply(&env(id, 3)),
            Err(ProjectionError::NonMonotonicSequence { last: 1, found: 3 })
        );
        assert!(cursors.should_apply(&env(id, 0)).is_err());
    }

    #[test]
    fn streams_are_tracked_independently() {
        let cursors = StreamCursors::new();
        let a = AggregateId::new();
        let b = AggregateId::new();
        cursors.advance(a, 5);
        assert_eq!(cursors.last(b), 0);
        assert_eq!(cursors.should_apply(&env(b, 1)), Ok(true));
    }
}
