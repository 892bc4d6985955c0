//! Tracer client - background trace delivery
//!
//! A single dedicated worker thread drains the delivery queue and
//! transmits each action to the ingestion server. Delivery is strictly
//! best-effort: failures are logged and the action dropped, never
//! retried, and nothing here may block or raise into the instrumented
//! application's call path.

mod queue;
mod transport;

pub use queue::DeliveryQueue;
pub use transport::{HttpTransport, Transport, API_KEY_HEADER};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::SdkConfig;
use crate::error::Result;
use crate::models::{DeliveryAction, TraceRecord, TraceUpdate};

/// Bounded wait for the worker thread to exit during shutdown. If the
/// worker is still mid-transmission past this point, shutdown proceeds
/// anyway; the host application must not hang on exit because of
/// telemetry.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Client that queues trace records and delivers them from a background
/// worker thread.
pub struct TracerClient {
    config: SdkConfig,
    queue: Arc<DeliveryQueue>,
    transport: Arc<dyn Transport>,
    stop: Arc<AtomicBool>,
    worker: Mutex<Option<WorkerHandle>>,
}

struct WorkerHandle {
    thread: JoinHandle<()>,
    done_rx: mpsc::Receiver<()>,
}

impl TracerClient {
    /// Create a client with the HTTP transport derived from `config`
    pub fn new(config: SdkConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config.endpoint, &config.api_key)?);
        Ok(Self::with_transport(config, transport))
    }

    /// Create a client with an explicit transport implementation
    pub fn with_transport(config: SdkConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            queue: Arc::new(DeliveryQueue::new()),
            transport,
            stop: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// SDK configuration this client was built with
    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    /// Number of actions waiting for delivery
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Queue a new trace for delivery. Non-blocking; no-op when tracing
    /// is disabled.
    pub fn send_trace(&self, record: TraceRecord) {
        if !self.config.enabled {
            return;
        }
        self.queue.push(DeliveryAction::Send(Box::new(record)));
    }

    /// Queue a partial update for an existing trace. Non-blocking;
    /// no-op when tracing is disabled.
    pub fn update_trace(&self, trace_id: impl Into<String>, update: TraceUpdate) {
        if !self.config.enabled {
            return;
        }
        self.queue.push(DeliveryAction::Update {
            trace_id: trace_id.into(),
            update: Box::new(update),
        });
    }

    /// Start the background worker. Idempotent: calling it while the
    /// worker is already running is a no-op. No-op when disabled.
    pub fn start(&self) {
        if !self.config.enabled {
            return;
        }

        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }

        self.stop.store(false, Ordering::Release);

        let queue = self.queue.clone();
        let transport = self.transport.clone();
        let stop = self.stop.clone();
        let wait = self.config.flush_interval;
        let (done_tx, done_rx) = mpsc::channel();

        let thread = std::thread::Builder::new()
            .name("llmtrace-sender".to_string())
            .spawn(move || {
                debug!("Trace sender worker started");
                while !stop.load(Ordering::Acquire) {
                    if let Some(action) = queue.pop_timeout(wait) {
                        transmit(transport.as_ref(), &action);
                    }
                }
                debug!("Trace sender worker exiting");
                let _ = done_tx.send(());
            })
            .expect("failed to spawn trace sender thread");

        *worker = Some(WorkerHandle { thread, done_rx });
        debug!("Tracer client worker started");
    }

    /// Remove and return every queued action in insertion order without
    /// transmitting anything. Useful for inspection and for callers that
    /// deliver through their own transport.
    pub fn take_pending(&self) -> Vec<DeliveryAction> {
        self.queue.drain()
    }

    /// Synchronously transmit every queued action in order. Each action
    /// gets one attempt; failures are logged and dropped.
    pub fn flush(&self) {
        for action in self.queue.drain() {
            transmit(self.transport.as_ref(), &action);
        }
    }

    /// Signal the worker to stop, drain the queue synchronously, and
    /// wait for the worker to exit within a bounded time. Safe to call
    /// more than once.
    pub fn shutdown(&self) {
        debug!("Shutting down tracer client...");

        self.stop.store(true, Ordering::Release);
        self.queue.notify_all();

        // Final drain is unconditional to maximize delivery of
        // already-captured data before process exit.
        self.flush();

        if let Some(handle) = self.worker.lock().take() {
            match handle.done_rx.recv_timeout(JOIN_TIMEOUT) {
                Ok(()) => {
                    let _ = handle.thread.join();
                }
                Err(_) => {
                    warn!(
                        "Trace sender worker did not exit within {:?}; proceeding with shutdown",
                        JOIN_TIMEOUT
                    );
                }
            }
        }

        debug!("Tracer client shutdown complete");
    }
}

/// One transmission attempt. All failure modes terminate here: they are
/// logged and the action is dropped.
fn transmit(transport: &dyn Transport, action: &DeliveryAction) {
    let result = match action {
        DeliveryAction::Send(record) => transport.create_trace(record),
        DeliveryAction::Update { trace_id, update } => transport.update_trace(trace_id, update),
    };

    match result {
        Ok(()) => debug!(trace_id = action.trace_id(), "delivered trace action"),
        Err(e) => warn!(
            trace_id = action.trace_id(),
            error = %e,
            "failed to deliver trace action, dropping"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InitOptions, SdkConfig};
    use crate::error::Error;
    use crate::models::TraceStatus;
    use chrono::Utc;
    use std::time::Instant;

    fn test_config(enabled: bool) -> SdkConfig {
        let mut config = SdkConfig::resolve(
            InitOptions::new()
                .api_key("lt-test")
                .flush_interval(0.05),
        )
        .unwrap();
        config.enabled = enabled;
        config
    }

    /// Records every transmitted action; optionally fails every attempt.
    struct RecordingTransport {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingTransport {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn record(&self, label: String) -> crate::error::Result<()> {
            self.sent.lock().push(label);
            if self.fail {
                Err(Error::Status(503))
            } else {
                Ok(())
            }
        }
    }

    impl Transport for RecordingTransport {
        fn create_trace(&self, record: &TraceRecord) -> crate::error::Result<()> {
            self.record(format!("send:{}", record.trace_id))
        }

        fn update_trace(&self, trace_id: &str, _update: &TraceUpdate) -> crate::error::Result<()> {
            self.record(format!("update:{trace_id}"))
        }

        fn create_batch(&self, records: &[TraceRecord]) -> crate::error::Result<()> {
            self.record(format!("batch:{}", records.len()))
        }
    }

    #[test]
    fn worker_drains_queue_in_order() {
        let transport = RecordingTransport::new(false);
        let client = TracerClient::with_transport(test_config(true), transport.clone());

        client.send_trace(TraceRecord::new("t1", Utc::now()));
        client.update_trace(
            "t1",
            TraceUpdate {
                status: Some(TraceStatus::Success),
                ..Default::default()
            },
        );

        client.start();
        client.start(); // idempotent

        let deadline = Instant::now() + Duration::from_secs(2);
        while client.pending() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        client.shutdown();

        assert_eq!(
            *transport.sent.lock(),
            vec!["send:t1".to_string(), "update:t1".to_string()]
        );
    }

    #[test]
    fn shutdown_drains_and_drops_on_failure_within_bound() {
        let transport = RecordingTransport::new(true);
        let client = TracerClient::with_transport(test_config(true), transport.clone());
        client.start();

        for i in 0..8 {
            client.send_trace(TraceRecord::new(format!("t{i}"), Utc::now()));
        }

        let start = Instant::now();
        client.shutdown();
        assert!(start.elapsed() < JOIN_TIMEOUT + Duration::from_secs(1));

        // Every item was attempted exactly once and then dropped.
        assert_eq!(client.pending(), 0);
        assert_eq!(transport.sent.lock().len(), 8);
    }

    #[test]
    fn disabled_client_neither_queues_nor_starts() {
        let transport = RecordingTransport::new(false);
        let client = TracerClient::with_transport(test_config(false), transport.clone());

        client.start();
        client.send_trace(TraceRecord::new("t1", Utc::now()));
        client.update_trace("t1", TraceUpdate::default());

        assert_eq!(client.pending(), 0);
        assert!(client.worker.lock().is_none());
        client.shutdown();
        assert!(transport.sent.lock().is_empty());
    }
}
