use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::message::{AckRef, PubsubMessage};

/// Internal representation of one received message, handed to the
/// downstream sink. Created per message, discarded once acked or nacked.
#[derive(Debug)]
pub struct Event {
    /// Deterministic idempotency key: a short digest over project and topic
    /// joined with the message id (unique within the topic).
    pub id: String,
    /// Publish time of the originating message, UTC.
    pub timestamp: DateTime<Utc>,
    /// Wall-clock time the event was built, UTC.
    pub created: DateTime<Utc>,
    /// Payload decoded as text.
    pub message: String,
    /// Message attributes, verbatim, only when the message carried any.
    pub labels: Option<HashMap<String, String>>,
    pub ack_ref: AckRef,
}

impl Event {
    /// Renders the structured field mapping for hosts that serialize events.
    pub fn fields(&self) -> serde_json::Value {
        let mut fields = serde_json::Map::new();
        fields.insert(
            "event".to_string(),
            serde_json::json!({
                "id": self.id,
                "created": self.created.to_rfc3339(),
            }),
        );
        fields.insert(
            "message".to_string(),
            serde_json::Value::String(self.message.clone()),
        );
        if let Some(labels) = &self.labels {
            fields.insert("labels".to_string(), serde_json::json!(labels));
        }
        serde_json::Value::Object(fields)
    }
}

/// Short sha256 digest of the project id plus topic name. Joined with
/// message ids (unique within a topic) it yields a unique event id.
pub(crate) fn topic_digest(project_id: &str, topic: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(project_id.as_bytes());
    hasher.update(topic.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..10].to_string()
}

pub(crate) fn make_event(topic_digest: &str, msg: Arc<PubsubMessage>) -> Event {
    let labels = (!msg.attributes.is_empty()).then(|| msg.attributes.clone());
    Event {
        id: format!("{}-{}", topic_digest, msg.id),
        timestamp: msg.publish_time.with_timezone(&Utc),
        created: Utc::now(),
        message: String::from_utf8_lossy(&msg.payload).into_owned(),
        labels,
        ack_ref: AckRef(msg),
    }
}
