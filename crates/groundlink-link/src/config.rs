//! Link configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use groundlink_wire::{default_selector, ProfileSelector, DEFAULT_MAX_PAYLOAD};

/// Which sockets carry which direction of traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// One bidirectional TCP stream for both directions.
    Tcp,
    /// TCP outbound, plus a UDP socket bound on the same port for inbound
    /// data. Used when the stand is configured to stream samples over
    /// datagrams.
    TcpWithUdpData,
}

/// Configuration for a [`TelemetryLink`](crate::TelemetryLink).
#[derive(Clone)]
pub struct LinkConfig {
    /// Socket arrangement for this deployment.
    pub transport: TransportMode,
    /// Budget for one TCP connect attempt.
    pub connect_timeout: Duration,
    /// Granularity of the worker's readiness wait. The inbound socket's
    /// read timeout; also how quickly control messages are observed while
    /// connected.
    pub read_timeout: Duration,
    /// Largest payload accepted from the wire before the stream is treated
    /// as desynchronized.
    pub max_payload_size: usize,
    /// Bound of the inbound sample queue.
    pub sample_queue_bound: usize,
    /// Bound of the inbound log-line queue.
    pub log_queue_bound: usize,
    /// Bound of the outbound send queue.
    pub send_queue_bound: usize,
    /// Chooses the wire profile for the peer at connect time.
    pub profile_selector: Arc<ProfileSelector>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            transport: TransportMode::Tcp,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_millis(50),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            sample_queue_bound: 4096,
            log_queue_bound: 256,
            send_queue_bound: 64,
            profile_selector: Arc::new(default_selector),
        }
    }
}

impl fmt::Debug for LinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkConfig")
            .field("transport", &self.transport)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("max_payload_size", &self.max_payload_size)
            .field("sample_queue_bound", &self.sample_queue_bound)
            .field("log_queue_bound", &self.log_queue_bound)
            .field("send_queue_bound", &self.send_queue_bound)
            .finish_non_exhaustive()
    }
}
