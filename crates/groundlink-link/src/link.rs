//! The public handle to the telemetry link.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender};

use groundlink_wire::{ChannelId, MessageType};

use crate::config::LinkConfig;
use crate::connection::{ConnectionState, LinkConnection};
use crate::error::{LinkError, Result, TransportError};
use crate::worker::{Control, LinkWorker, Outbound};

/// One decoded, calibrated sensor reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibratedSample {
    pub channel: ChannelId,
    /// Physical-units value: `raw * scale + offset`, or `0.0` when the
    /// channel has no calibration registered.
    pub value: f64,
    /// Firmware capture timestamp, passed through unchanged.
    pub timestamp: u64,
}

/// Handle to the ground-station telemetry link.
///
/// The handle starts one background worker thread at construction; the
/// worker owns the sockets and the whole decode pipeline for its lifetime.
/// The only objects crossing the thread boundary are immutable byte
/// buffers and decoded samples moving through bounded queues, which
/// consumers poll on their own cadence.
pub struct TelemetryLink {
    control_tx: Sender<Control>,
    outbound_tx: Sender<Outbound>,
    samples_rx: Receiver<CalibratedSample>,
    log_rx: Receiver<String>,
    state: Arc<AtomicU8>,
    worker: Option<JoinHandle<()>>,
}

impl TelemetryLink {
    /// Start the link in the `Idle` state with its worker thread running.
    pub fn new(config: LinkConfig) -> Result<Self> {
        let (control_tx, control_rx) = bounded(32);
        let (outbound_tx, outbound_rx) = bounded(config.send_queue_bound);
        let (samples_tx, samples_rx) = bounded(config.sample_queue_bound);
        let (log_tx, log_rx) = bounded(config.log_queue_bound);

        let max_payload = config.max_payload_size;
        let conn = LinkConnection::new(config);
        let state = conn.published_state();

        let worker = LinkWorker::new(
            conn,
            control_rx,
            outbound_rx,
            samples_tx,
            log_tx,
            max_payload,
        );
        let handle = std::thread::Builder::new()
            .name("groundlink-worker".into())
            .spawn(move || worker.run())
            .map_err(TransportError::Io)?;

        Ok(Self {
            control_tx,
            outbound_tx,
            samples_rx,
            log_rx,
            state,
            worker: Some(handle),
        })
    }

    /// Start the link with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(LinkConfig::default())
    }

    /// Connect to the stand at `addr:port`.
    ///
    /// The attempt happens on the worker thread; this call waits for its
    /// outcome. Connecting to the same endpoint while already connected is
    /// a successful no-op. Timeouts and refusals are recoverable; calling
    /// again retries.
    pub fn connect(&self, addr: IpAddr, port: u16) -> Result<()> {
        let (reply_tx, reply_rx) = bounded(1);
        self.control_tx
            .send(Control::Connect {
                addr: SocketAddr::new(addr, port),
                reply: reply_tx,
            })
            .map_err(|_| LinkError::Shutdown)?;
        reply_rx.recv().map_err(|_| LinkError::Shutdown)?
    }

    /// Close the connection, if any. Idempotent.
    pub fn disconnect(&self) {
        let _ = self.control_tx.send(Control::Disconnect);
    }

    /// The connection state as last published by the worker.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Queue a command frame for the stand.
    ///
    /// Returns `false` without queuing when the link is not connected;
    /// callers must check connection state before assuming delivery.
    pub fn send_command(&self, msg_type: MessageType) -> bool {
        self.is_connected() && self.outbound_tx.try_send(Outbound::Command(msg_type)).is_ok()
    }

    /// Queue a free-text frame for the stand. Same silent-fail contract as
    /// [`send_command`](Self::send_command).
    pub fn send_text(&self, text: &str) -> bool {
        self.is_connected()
            && self
                .outbound_tx
                .try_send(Outbound::Text(text.to_owned()))
                .is_ok()
    }

    /// Queue pre-encoded bytes for the stand, bypassing the codec. The
    /// caller is responsible for matching the active wire profile.
    pub fn send_raw(&self, bytes: Bytes) -> bool {
        self.is_connected() && self.outbound_tx.try_send(Outbound::Raw(bytes)).is_ok()
    }

    /// Take every sample currently queued, in arrival order.
    pub fn poll_samples(&self) -> Vec<CalibratedSample> {
        self.samples_rx.try_iter().collect()
    }

    /// Take every human-readable log line currently queued.
    pub fn poll_log(&self) -> Vec<String> {
        self.log_rx.try_iter().collect()
    }

    /// Register or replace a channel's linear calibration.
    pub fn register_calibration(&self, channel: ChannelId, scale: f64, offset: f64) {
        let _ = self.control_tx.send(Control::RegisterCalibration {
            channel,
            scale,
            offset,
        });
    }

    /// Drop all registered calibrations.
    pub fn clear_calibration(&self) {
        let _ = self.control_tx.send(Control::ClearCalibration);
    }

    /// Stop the worker thread, closing any open connection first.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = self.control_tx.send(Control::Shutdown);
            let _ = handle.join();
        }
    }
}

impl Drop for TelemetryLink {
    fn drop(&mut self) {
        self.shutdown();
    }
}
