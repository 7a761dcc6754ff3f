//! Resilient streaming ingestion from a publish/subscribe message source.
//!
//! A [`SourceWorker`] owns one subscription: it pulls messages through an
//! abstract [`SourceClient`], maps each message to an [`Event`], pushes
//! events into a [`PipelineSink`], and bridges the sink's asynchronous
//! delivery outcomes back to the source's ack/nack primitives. A rate-limited
//! watchdog restarts the receive loop after transient failures and sink
//! backpressure, so the host starts the worker once and trusts it to
//! self-heal until [`SourceWorker::stop`] is called.

mod config;
mod error;
mod event;
mod message;
mod metrics;
mod registry;
mod sink;
mod source;
mod status;
mod worker;

pub use crate::config::{PubsubSourceConfig, SubscriptionConfig};
pub use crate::error::{Error, Result};
pub use crate::event::Event;
pub use crate::message::{AckRef, Acknowledger, DeliveryOutcome, PubsubMessage};
pub use crate::metrics::{metrics_handler, start_metrics_http_server};
pub use crate::registry::{InputConstructor, InputRegistry};
pub use crate::sink::{LogSink, PipelineSink};
pub use crate::source::{ClientFactory, MessageHandler, ReceiveSettings, SourceClient};
pub use crate::status::{NoopStatusReporter, SharedStatus, StatusReporter, WorkerState};
pub use crate::worker::{SourceWorker, SourceWorkerBuilder};
