use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use throttle::RateLimiter;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PubsubSourceConfig;
use crate::error::{Error, Result};
use crate::event::{make_event, topic_digest};
use crate::message::DeliveryOutcome;
use crate::metrics::WorkerMetrics;
use crate::sink::PipelineSink;
use crate::source::{ClientFactory, MessageHandler, ReceiveSettings, SourceClient, ensure_subscription};
use crate::status::{NoopStatusReporter, StatusReporter, WorkerState};

/// Minimum duration between run-attempt starts.
const RETRY_INTERVAL: Duration = Duration::from_secs(30);

/// Builds a [`SourceWorker`]. Construction validates the configuration and
/// reports Starting/Configuring/Failed on the status reporter; configuration
/// errors never enter the retry loop.
pub struct SourceWorkerBuilder<G, S> {
    config: PubsubSourceConfig,
    factory: G,
    sink: S,
    outcomes: mpsc::Receiver<DeliveryOutcome>,
    status: Option<Arc<dyn StatusReporter>>,
    retry_interval: Duration,
}

impl<G, S> SourceWorkerBuilder<G, S>
where
    G: ClientFactory + Send + Sync + 'static,
    S: PipelineSink,
{
    pub fn new(
        config: PubsubSourceConfig,
        factory: G,
        sink: S,
        outcomes: mpsc::Receiver<DeliveryOutcome>,
    ) -> Self {
        Self {
            config,
            factory,
            sink,
            outcomes,
            status: None,
            retry_interval: RETRY_INTERVAL,
        }
    }

    pub fn status_reporter(mut self, status: Arc<dyn StatusReporter>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn build(self) -> Result<SourceWorker<G, S>> {
        let status = self
            .status
            .unwrap_or_else(|| Arc::new(NoopStatusReporter));
        status.update_status(WorkerState::Starting, "");

        status.update_status(WorkerState::Configuring, "");
        if let Err(e) = self.config.validate() {
            status.update_status(WorkerState::Failed, &format!("failed to configure worker: {e}"));
            return Err(e);
        }
        let id = match self.config.worker_id() {
            Ok(id) => id,
            Err(e) => {
                status.update_status(WorkerState::Failed, &format!("failed to get worker id: {e}"));
                return Err(e);
            }
        };

        let metrics = Arc::new(WorkerMetrics::new(&id));
        let worker_token = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(false);

        info!(
            project = %self.config.project_id,
            topic = %self.config.topic,
            subscription = %self.config.subscription.name,
            worker_id = %id,
            "Initialized Pub/Sub ingestion worker"
        );

        let supervisor = Supervisor {
            config: Arc::new(self.config),
            factory: self.factory,
            sink: Arc::new(self.sink),
            status: Arc::clone(&status),
            metrics: Arc::clone(&metrics),
            token: worker_token.clone(),
            retry_interval: self.retry_interval,
            outcomes: self.outcomes,
            done: done_tx,
        };

        Ok(SourceWorker {
            id,
            status,
            metrics,
            worker_token,
            started: AtomicBool::new(false),
            parts: Mutex::new(Some(supervisor)),
            handle: Mutex::new(None),
            done_rx,
        })
    }
}

/// A streaming-ingestion worker bound to one subscription. [`run`] starts
/// the supervising task at most once; [`stop`] cancels the worker's
/// cancellation scope and waits for a full, resource-releasing exit.
///
/// [`run`]: SourceWorker::run
/// [`stop`]: SourceWorker::stop
pub struct SourceWorker<G, S>
where
    G: ClientFactory + Send + Sync + 'static,
    S: PipelineSink,
{
    id: String,
    status: Arc<dyn StatusReporter>,
    metrics: Arc<WorkerMetrics>,
    worker_token: CancellationToken,
    started: AtomicBool,
    parts: Mutex<Option<Supervisor<G, S>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    done_rx: watch::Receiver<bool>,
}

impl<G, S> SourceWorker<G, S>
where
    G: ClientFactory + Send + Sync + 'static,
    S: PipelineSink,
{
    /// Identifier this worker registers its metrics under.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Starts the supervising task and returns immediately. Only the first
    /// invocation has any effect.
    pub fn run(&self) {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let Some(supervisor) = self.parts.lock().take() else {
            return;
        };
        let handle = tokio::spawn(supervisor.run());
        *self.handle.lock() = Some(handle);
    }

    /// Signals cancellation to the worker's whole cancellation scope and
    /// waits until the supervising task has exited and released its
    /// resources. Safe to call any number of times; every call observes the
    /// same completion.
    pub async fn stop(&self) {
        self.worker_token.cancel();

        if !self.started.load(Ordering::SeqCst) {
            self.status.update_status(WorkerState::Stopped, "");
            self.metrics.close();
            return;
        }

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = ?e, "Pub/Sub source worker task failed to join");
            }
        } else {
            // Another stop() owns the join; wait for it to finish.
            let mut done = self.done_rx.clone();
            while !*done.borrow_and_update() {
                if done.changed().await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Owns one worker's background state: the watchdog loop and the
/// acknowledgment bridge.
struct Supervisor<G, S> {
    config: Arc<PubsubSourceConfig>,
    factory: G,
    sink: Arc<S>,
    status: Arc<dyn StatusReporter>,
    metrics: Arc<WorkerMetrics>,
    token: CancellationToken,
    retry_interval: Duration,
    outcomes: mpsc::Receiver<DeliveryOutcome>,
    done: watch::Sender<bool>,
}

impl<G, S> Supervisor<G, S>
where
    G: ClientFactory + Send + Sync + 'static,
    S: PipelineSink,
{
    async fn run(self) {
        info!("Pub/Sub source worker has started");
        let Supervisor {
            config,
            factory,
            sink,
            status,
            metrics,
            token,
            retry_interval,
            outcomes,
            done,
        } = self;

        let bridge = tokio::spawn(ack_bridge(
            outcomes,
            Arc::clone(&metrics),
            token.clone(),
        ));

        // Throttle client restarts: watchdog to keep the worker operating
        // after an error.
        let mut limiter = RateLimiter::new(retry_interval);
        while !token.is_cancelled() {
            if limiter.wait(&token).await.is_err() {
                continue;
            }

            match run_attempt(&config, &factory, &sink, &status, &metrics, &token).await {
                Ok(()) => {}
                Err(e) => {
                    if !token.is_cancelled() {
                        warn!(error = %e, "Restarting failed Pub/Sub source worker");
                        continue;
                    }
                    // Log any non-cancellation error before stopping.
                    if e != Error::Cancelled {
                        error!(error = %e, "Pub/Sub source worker failed");
                    }
                }
            }
        }

        token.cancel();
        status.update_status(WorkerState::Stopping, "");
        if let Err(e) = bridge.await {
            error!(error = ?e, "acknowledgment bridge failed to join");
        }
        metrics.close();
        status.update_status(WorkerState::Stopped, "");
        info!("Pub/Sub source worker has stopped");
        let _ = done.send(true);
    }
}

/// One full attempt: acquire a fresh client, resolve the subscription, run
/// the receive loop to completion or error. The attempt owns a child token
/// of the worker scope so a sink rejection terminates only this attempt.
async fn run_attempt<G, S>(
    config: &Arc<PubsubSourceConfig>,
    factory: &G,
    sink: &Arc<S>,
    status: &Arc<dyn StatusReporter>,
    metrics: &Arc<WorkerMetrics>,
    worker_token: &CancellationToken,
) -> Result<()>
where
    G: ClientFactory + Send + Sync + 'static,
    S: PipelineSink,
{
    let ctx = worker_token.child_token();
    let _guard = ctx.clone().drop_guard();

    let client = match factory.connect(config).await {
        Ok(client) => client,
        Err(e) => {
            status.update_status(WorkerState::Degraded, &e.to_string());
            return Err(e);
        }
    };

    status.update_status(WorkerState::Running, "");

    if let Err(e) = ensure_subscription(
        &client,
        &config.subscription.name,
        &config.topic,
        config.subscription.create,
    )
    .await
    {
        status.update_status(
            WorkerState::Degraded,
            &format!("failed to subscribe to topic: {e}"),
        );
        return Err(e);
    }

    let digest = topic_digest(&config.project_id, &config.topic);
    let handler: MessageHandler = {
        let sink = Arc::clone(sink);
        let metrics = Arc::clone(metrics);
        let ctx = ctx.clone();
        Arc::new(move |msg| {
            let msg = Arc::new(msg);
            let event = make_event(&digest, Arc::clone(&msg));
            if !sink.deliver(event) {
                msg.nack();
                metrics.inc_nacked();
                debug!("sink rejected event, stopping the receive loop");
                ctx.cancel();
            }
        })
    };

    let settings = ReceiveSettings {
        num_receivers: config.subscription.num_receivers,
        max_outstanding_messages: config.subscription.max_outstanding_messages,
    };
    let result = client
        .receive(&config.subscription.name, settings, ctx.clone(), handler)
        .await;
    if let Err(e) = &result {
        status.update_status(
            WorkerState::Degraded,
            &format!(
                "failed to receive message from topic {}/{}: {e}",
                config.project_id, config.topic
            ),
        );
    }
    result
}

/// Connects downstream delivery outcomes back to the original message's
/// ack/nack capability. A vouched-for delivery acks the message and updates
/// the counters; an uncertain one is only logged, leaving the message to the
/// source's redelivery policy.
async fn ack_bridge(
    mut outcomes: mpsc::Receiver<DeliveryOutcome>,
    metrics: Arc<WorkerMetrics>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            outcome = outcomes.recv() => {
                let Some(DeliveryOutcome { ack_ref, success }) = outcome else {
                    break;
                };
                let msg = ack_ref.into_message();
                if success {
                    msg.ack();
                    metrics.inc_acked();
                    metrics.add_read_bytes(msg.payload.len() as u64);
                    let elapsed = Utc::now().signed_duration_since(msg.publish_time);
                    metrics.observe_processing_time(
                        elapsed.num_microseconds().unwrap_or(i64::MAX).max(0) as f64,
                    );
                } else {
                    metrics.inc_ack_failed();
                    error!("Failed acking Pub/Sub event");
                }
            }
        }
    }
}
