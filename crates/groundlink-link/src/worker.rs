//! The background worker that owns all transport I/O.
//!
//! One worker thread is started when the link is constructed and lives
//! until an explicit shutdown. Each iteration observes control messages,
//! drains the outbound queue, and reads/decodes inbound frames. The worker
//! is the only thread that ever touches the sockets, so the connection
//! state machine needs no locking.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, error, warn};

use groundlink_wire::{codec, ChannelId, Frame, MessageType, WireError};

use crate::calibration::CalibrationTable;
use crate::connection::{ConnectionState, LinkConnection};
use crate::error::Result;
use crate::link::CalibratedSample;
use crate::router::{route, RouteTarget};

/// How long the worker sleeps on the control channel while disconnected.
const IDLE_TICK: Duration = Duration::from_millis(100);

/// Messages from the handle to the worker. All state transitions happen on
/// the worker in response to these.
pub(crate) enum Control {
    Connect {
        addr: SocketAddr,
        reply: Sender<Result<()>>,
    },
    Disconnect,
    RegisterCalibration {
        channel: ChannelId,
        scale: f64,
        offset: f64,
    },
    ClearCalibration,
    Shutdown,
}

/// An entry on the outbound send queue.
///
/// Commands and text are encoded on the worker because the active wire
/// profile is only resolved once a connection is up; pre-encoded buffers
/// pass through untouched.
pub(crate) enum Outbound {
    Command(MessageType),
    Text(String),
    Raw(Bytes),
}

pub(crate) struct LinkWorker {
    conn: LinkConnection,
    calibration: CalibrationTable,
    control_rx: Receiver<Control>,
    outbound_rx: Receiver<Outbound>,
    samples_tx: Sender<CalibratedSample>,
    log_tx: Sender<String>,
    rx_buf: BytesMut,
    max_payload: usize,
}

impl LinkWorker {
    pub fn new(
        conn: LinkConnection,
        control_rx: Receiver<Control>,
        outbound_rx: Receiver<Outbound>,
        samples_tx: Sender<CalibratedSample>,
        log_tx: Sender<String>,
        max_payload: usize,
    ) -> Self {
        Self {
            conn,
            calibration: CalibrationTable::new(),
            control_rx,
            outbound_rx,
            samples_tx,
            log_tx,
            rx_buf: BytesMut::with_capacity(8 * 1024),
            max_payload,
        }
    }

    pub fn run(mut self) {
        debug!("link worker started");
        'main: loop {
            if self.conn.state() != ConnectionState::Connected {
                // Nothing to multiplex; idle on the control channel so
                // connect/disconnect calls are still observed promptly.
                match self.control_rx.recv_timeout(IDLE_TICK) {
                    Ok(msg) => {
                        if !self.handle_control(msg) {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
                continue;
            }

            while let Ok(msg) = self.control_rx.try_recv() {
                if !self.handle_control(msg) {
                    break 'main;
                }
            }
            if self.conn.state() != ConnectionState::Connected {
                continue;
            }

            self.drain_outbound();
            if self.conn.state() != ConnectionState::Connected {
                continue;
            }

            match self.conn.recv_chunk(&mut self.rx_buf) {
                Ok(0) => {} // readiness wait elapsed, no data
                Ok(_) => self.drain_frames(),
                Err(err) => {
                    warn!(error = %err, "receive failed, disconnecting");
                    self.emit_log(format!("link lost: {err}"));
                    self.drop_connection();
                }
            }
        }
        self.conn.disconnect();
        debug!("link worker stopped");
    }

    /// Returns `false` when the worker should stop.
    fn handle_control(&mut self, msg: Control) -> bool {
        match msg {
            Control::Connect { addr, reply } => {
                let fresh = self.conn.state() != ConnectionState::Connected
                    || self.conn.endpoint() != Some(addr);
                if fresh {
                    self.rx_buf.clear();
                }
                let result = self.conn.connect(addr);
                let _ = reply.send(result);
            }
            Control::Disconnect => self.drop_connection(),
            Control::RegisterCalibration {
                channel,
                scale,
                offset,
            } => self.calibration.register(channel, scale, offset),
            Control::ClearCalibration => self.calibration.clear(),
            Control::Shutdown => {
                self.drop_connection();
                return false;
            }
        }
        true
    }

    fn drop_connection(&mut self) {
        self.conn.disconnect();
        self.rx_buf.clear();
        // Stale queued sends must not leak into the next session.
        while self.outbound_rx.try_recv().is_ok() {}
    }

    /// Drain the outbound queue FIFO. A send error is not retried inline;
    /// it triggers the disconnect transition.
    fn drain_outbound(&mut self) {
        while let Ok(out) = self.outbound_rx.try_recv() {
            let buf = match self.encode_outbound(out) {
                Ok(buf) => buf,
                Err(err) => {
                    warn!(error = %err, "dropping unencodable outbound message");
                    continue;
                }
            };
            if let Err(err) = self.conn.send_bytes(&buf) {
                warn!(error = %err, "send failed, disconnecting");
                self.emit_log(format!("link lost: {err}"));
                self.drop_connection();
                return;
            }
        }
    }

    fn encode_outbound(&self, out: Outbound) -> groundlink_wire::Result<Bytes> {
        let profile = self.conn.profile();
        Ok(match out {
            Outbound::Command(msg_type) => codec::encode_command(msg_type, profile).freeze(),
            Outbound::Text(text) => codec::encode_text(&text, profile)?.freeze(),
            Outbound::Raw(bytes) => bytes,
        })
    }

    /// Decode every complete frame accumulated so far, in arrival order.
    fn drain_frames(&mut self) {
        loop {
            match codec::extract_frame(&mut self.rx_buf, self.conn.profile(), self.max_payload) {
                Ok(Some(frame)) => self.dispatch(frame),
                Ok(None) => break,
                Err(WireError::UnknownMessageType(code)) => {
                    // The offending frame was consumed whole; the stream is
                    // still framed, so the session survives.
                    warn!(code, "dropping frame with unknown message type");
                    self.emit_log(format!("dropped frame with unknown type code {code}"));
                }
                Err(err) => {
                    // A declared length beyond the cap means the byte
                    // stream has lost framing and cannot be resynchronized.
                    error!(error = %err, "stream desynchronized, disconnecting");
                    self.emit_log(format!("link lost: {err}"));
                    self.drop_connection();
                    break;
                }
            }
        }
    }

    fn dispatch(&mut self, frame: Frame) {
        match route(frame.msg_type) {
            RouteTarget::Ignore => {}
            RouteTarget::EmitText => {
                let text = String::from_utf8_lossy(&frame.payload).into_owned();
                self.emit_log(text);
            }
            RouteTarget::Deliver(channel) => self.deliver(channel, &frame),
            RouteTarget::Reject => {
                warn!(
                    msg_type = frame.msg_type.name(),
                    "unexpected inbound message type"
                );
                self.emit_log(format!(
                    "unexpected inbound message: {}",
                    frame.msg_type.name()
                ));
            }
        }
    }

    fn deliver(&mut self, channel: ChannelId, frame: &Frame) {
        let records = match codec::split_records(&frame.payload, self.conn.profile()) {
            Ok(records) => records,
            Err(err) => {
                // Malformed payload from a noisy link; drop the frame and
                // keep the session.
                warn!(channel = channel.label(), error = %err, "dropping malformed payload");
                self.emit_log(format!(
                    "dropped malformed {} payload: {err}",
                    channel.label()
                ));
                return;
            }
        };

        if self.calibration.get(channel).is_none() {
            debug!(
                channel = channel.label(),
                "no calibration registered, values pass through as 0.0"
            );
        }

        for record in records {
            let sample = CalibratedSample {
                channel,
                value: self.calibration.apply(channel, record.raw),
                timestamp: record.timestamp,
            };
            match self.samples_tx.try_send(sample) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(
                        channel = channel.label(),
                        "inbound sample queue full, dropping sample"
                    );
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    fn emit_log(&self, line: String) {
        if let Err(TrySendError::Full(_)) = self.log_tx.try_send(line) {
            warn!("inbound log queue full, dropping line");
        }
    }
}
