use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Positive/negative acknowledgment capability bound to one specific
/// delivery. Owned by the message source client; the worker only forwards
/// the decision.
pub trait Acknowledger: Send + Sync {
    fn ack(&self);
    fn nack(&self);
}

/// One unit of work delivered by the message source. The payload is never
/// mutated by the worker; the message stays owned by the source until it is
/// acked or nacked.
pub struct PubsubMessage {
    /// Source-assigned identifier, unique within the topic.
    pub id: String,
    pub payload: Bytes,
    pub attributes: HashMap<String, String>,
    pub publish_time: DateTime<Utc>,
    acker: Arc<dyn Acknowledger>,
}

impl PubsubMessage {
    pub fn new(
        id: impl Into<String>,
        payload: Bytes,
        attributes: HashMap<String, String>,
        publish_time: DateTime<Utc>,
        acker: Arc<dyn Acknowledger>,
    ) -> Self {
        Self {
            id: id.into(),
            payload,
            attributes,
            publish_time,
            acker,
        }
    }

    pub fn ack(&self) {
        self.acker.ack();
    }

    pub fn nack(&self) {
        self.acker.nack();
    }
}

impl fmt::Debug for PubsubMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PubsubMessage")
            .field("id", &self.id)
            .field("payload_len", &self.payload.len())
            .field("attributes", &self.attributes)
            .field("publish_time", &self.publish_time)
            .finish()
    }
}

/// Opaque back-reference from an event to its originating message. The sink
/// carries it back unchanged in a [`DeliveryOutcome`]; only the
/// acknowledgment bridge looks inside.
pub struct AckRef(pub(crate) Arc<PubsubMessage>);

impl AckRef {
    pub(crate) fn into_message(self) -> Arc<PubsubMessage> {
        self.0
    }
}

impl fmt::Debug for AckRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AckRef({})", self.0.id)
    }
}

/// Per-event delivery outcome reported by the downstream sink, at most one
/// per delivered event, in any order.
#[derive(Debug)]
pub struct DeliveryOutcome {
    pub ack_ref: AckRef,
    pub success: bool,
}
