use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::PubsubSourceConfig;
use crate::error::{Error, Result};
use crate::message::PubsubMessage;

/// Receive concurrency hints applied to the client before the receive loop
/// starts. These bounds are the only admission control on inbound volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveSettings {
    pub num_receivers: usize,
    pub max_outstanding_messages: usize,
}

/// Invoked exactly once per inbound message. The client may call it from
/// any number of internal receive workers.
pub type MessageHandler = Arc<dyn Fn(PubsubMessage) + Send + Sync>;

/// Capability surface of the external message source. The wire protocol
/// belongs entirely to implementations of this trait.
#[trait_variant::make(SourceClient: Send)]
pub trait LocalSourceClient {
    async fn subscription_exists(&self, name: &str) -> Result<bool>;

    async fn create_subscription(&self, name: &str, topic: &str) -> Result<()>;

    /// Runs the receive loop until `cancel` fires or a fatal receive error
    /// occurs. Returns `Ok(())` when ended by cancellation; implementations
    /// that surface cancellation as an error use [`Error::Cancelled`].
    async fn receive(
        &self,
        subscription: &str,
        settings: ReceiveSettings,
        cancel: CancellationToken,
        handler: MessageHandler,
    ) -> Result<()>;
}

/// Constructs a fresh client for each run attempt. Endpoint override and
/// credential material from the configuration pass through verbatim.
#[trait_variant::make(ClientFactory: Send)]
pub trait LocalClientFactory {
    type Client: SourceClient + Send + Sync + 'static;

    async fn connect(&self, config: &PubsubSourceConfig) -> Result<Self::Client>;
}

/// Resolves the named subscription: use it if it exists, create it when
/// permitted, otherwise fail. The unavailable case is still retried by the
/// watchdog since the topic may be created out-of-band later.
pub(crate) async fn ensure_subscription<C: SourceClient>(
    client: &C,
    name: &str,
    topic: &str,
    create: bool,
) -> Result<()> {
    if client.subscription_exists(name).await? {
        return Ok(());
    }

    if create {
        client.create_subscription(name, topic).await?;
        debug!(subscription = name, "created new subscription");
        return Ok(());
    }

    Err(Error::SubscriptionUnavailable(name.to_string()))
}
