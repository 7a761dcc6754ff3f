use tokio::sync::mpsc;
use tracing::info;

use crate::event::Event;
use crate::message::DeliveryOutcome;

/// Downstream consumer of events, external to this crate.
pub trait PipelineSink: Send + Sync + 'static {
    /// Delivers one event. Returning `false` signals that the sink cannot
    /// accept the event right now (backpressure); the worker nacks the
    /// originating message and restarts the receive loop through the
    /// watchdog's rate limit.
    fn deliver(&self, event: Event) -> bool;
}

/// Builtin sink that logs each event and immediately reports a successful
/// delivery outcome. Useful for smoke-testing a subscription end to end.
pub struct LogSink {
    outcomes: mpsc::Sender<DeliveryOutcome>,
}

impl LogSink {
    pub fn new(outcomes: mpsc::Sender<DeliveryOutcome>) -> Self {
        Self { outcomes }
    }
}

impl PipelineSink for LogSink {
    fn deliver(&self, event: Event) -> bool {
        info!(event_id = %event.id, message = %event.message, "log sink");
        self.outcomes
            .try_send(DeliveryOutcome {
                ack_ref: event.ack_ref,
                success: true,
            })
            .is_ok()
    }
}
