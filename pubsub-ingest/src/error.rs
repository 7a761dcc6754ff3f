use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Config Error - {0}")]
    Config(String),

    #[error("Connection Error - {0}")]
    Connection(String),

    #[error("Source Error - {0}")]
    Source(String),

    #[error("no subscription {0} exists and subscription creation is not enabled")]
    SubscriptionUnavailable(String),

    #[error("Metrics Error - {0}")]
    Metrics(String),

    #[error("Cancelled")]
    Cancelled,
}
