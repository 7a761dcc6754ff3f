use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

const DEFAULT_NUM_RECEIVERS: usize = 1;
const DEFAULT_MAX_OUTSTANDING_MESSAGES: usize = 1600;

/// Immutable configuration for one Pub/Sub ingestion worker. One worker owns
/// exactly one subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubsubSourceConfig {
    pub project_id: String,
    pub topic: String,
    pub subscription: SubscriptionConfig,

    /// Alternate endpoint, typically a local emulator used by tests. Passed
    /// through verbatim to the client factory.
    #[serde(default)]
    pub alternative_host: Option<String>,

    /// Path to a credentials file. Mutually exclusive with
    /// `credentials_json`.
    #[serde(default)]
    pub credentials_file: Option<String>,

    /// Inline credential content. Mutually exclusive with
    /// `credentials_file`.
    #[serde(default)]
    pub credentials_json: Option<String>,

    /// Identifier used for metrics registration. Derived from the
    /// configuration when not set.
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    pub name: String,

    /// Create the subscription when it does not exist yet.
    #[serde(default)]
    pub create: bool,

    /// Number of parallel receive workers the client may fan out to.
    #[serde(default = "default_num_receivers")]
    pub num_receivers: usize,

    /// Upper bound on messages held by the client awaiting acknowledgment.
    #[serde(default = "default_max_outstanding_messages")]
    pub max_outstanding_messages: usize,
}

fn default_num_receivers() -> usize {
    DEFAULT_NUM_RECEIVERS
}

fn default_max_outstanding_messages() -> usize {
    DEFAULT_MAX_OUTSTANDING_MESSAGES
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            create: false,
            num_receivers: DEFAULT_NUM_RECEIVERS,
            max_outstanding_messages: DEFAULT_MAX_OUTSTANDING_MESSAGES,
        }
    }
}

impl PubsubSourceConfig {
    /// Validates the configuration. Violations are configuration errors and
    /// never enter the retry loop.
    pub fn validate(&self) -> Result<()> {
        if self.project_id.is_empty() {
            return Err(Error::Config("project_id must not be empty".to_string()));
        }
        if self.topic.is_empty() {
            return Err(Error::Config("topic must not be empty".to_string()));
        }
        if self.subscription.name.is_empty() {
            return Err(Error::Config(
                "subscription.name must not be empty".to_string(),
            ));
        }
        if self.credentials_file.is_some() && self.credentials_json.is_some() {
            return Err(Error::Config(
                "credentials_file and credentials_json are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }

    /// Identifier used to label this worker's metrics. The explicit `id`
    /// wins; otherwise the id is a short digest of the canonical JSON
    /// serialization of the full configuration, so the same configuration
    /// always maps to the same id.
    pub fn worker_id(&self) -> Result<String> {
        if let Some(id) = &self.id {
            if !id.is_empty() {
                return Ok(id.clone());
            }
        }

        let canonical = serde_json::to_vec(self).map_err(|e| {
            Error::Config(format!("cannot compute worker id from configuration: {e}"))
        })?;
        let digest = hex::encode(Sha256::digest(&canonical));
        Ok(digest[..16].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> PubsubSourceConfig {
        PubsubSourceConfig {
            project_id: "test-project".to_string(),
            topic: "test-topic".to_string(),
            subscription: SubscriptionConfig {
                name: "test-subscription".to_string(),
                ..Default::default()
            },
            alternative_host: None,
            credentials_file: None,
            credentials_json: None,
            id: None,
        }
    }

    #[test]
    fn deserialize_applies_defaults() {
        let config: PubsubSourceConfig = serde_json::from_value(serde_json::json!({
            "project_id": "p",
            "topic": "t",
            "subscription": { "name": "s" },
        }))
        .unwrap();

        assert!(!config.subscription.create);
        assert_eq!(config.subscription.num_receivers, 1);
        assert_eq!(config.subscription.max_outstanding_messages, 1600);
        assert_eq!(config.alternative_host, None);
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_missing_identifiers() {
        let mut config = base_config();
        config.project_id = String::new();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = base_config();
        config.topic = String::new();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = base_config();
        config.subscription.name = String::new();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn validate_rejects_both_credential_forms() {
        let mut config = base_config();
        config.credentials_file = Some("/etc/creds.json".to_string());
        config.credentials_json = Some("{}".to_string());
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        // Either form alone is fine, as is neither (ambient credentials).
        config.credentials_json = None;
        config.validate().unwrap();
    }

    #[test]
    fn worker_id_prefers_explicit_id() {
        let mut config = base_config();
        config.id = Some("my-worker".to_string());
        assert_eq!(config.worker_id().unwrap(), "my-worker");
    }

    #[test]
    fn worker_id_is_deterministic() {
        let config = base_config();
        let id = config.worker_id().unwrap();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, base_config().worker_id().unwrap());

        let mut other = base_config();
        other.topic = "other-topic".to_string();
        assert_ne!(id, other.worker_id().unwrap());
    }
}
