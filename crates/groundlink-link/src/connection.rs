//! The connection state machine and blocking socket primitives.
//!
//! All socket handles live here and are touched only by the worker thread
//! that owns the [`LinkConnection`]. Other threads observe the connection
//! through the published state atomic.

use std::io::{ErrorKind, Read, Write};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use tracing::{debug, info, trace, warn};

use groundlink_wire::{WireProfile, PI_PROFILE};

use crate::config::{LinkConfig, TransportMode};
use crate::error::{LinkError, Result, TransportError};

/// TCP read chunk size. Stream bytes accumulate across reads, so the chunk
/// only bounds one syscall, not a frame.
const RECV_CHUNK: usize = 4096;

/// Lifecycle of the link's transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Idle = 0,
    Connecting = 1,
    Connected = 2,
    Disconnecting = 3,
}

impl ConnectionState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Disconnecting,
            _ => ConnectionState::Idle,
        }
    }
}

/// Owns the transport sockets and the reconnect/disconnect state machine.
///
/// Invariants: at most one of `Connecting`/`Connected` holds at any time,
/// and socket handles are `Some` exactly while `Connected` (during
/// `Connecting` they are still `None` until the attempt succeeds).
pub(crate) struct LinkConnection {
    config: LinkConfig,
    tcp: Option<TcpStream>,
    udp: Option<UdpSocket>,
    /// Receive buffer for the datagram endpoint. Unlike TCP, a datagram is
    /// delivered whole or not at all; a short buffer would silently
    /// truncate it, so this is sized for the largest legal frame.
    udp_buf: Vec<u8>,
    endpoint: Option<SocketAddr>,
    profile: &'static WireProfile,
    state: ConnectionState,
    published: Arc<AtomicU8>,
}

impl LinkConnection {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            tcp: None,
            udp: None,
            udp_buf: Vec::new(),
            endpoint: None,
            profile: &PI_PROFILE,
            state: ConnectionState::Idle,
            published: Arc::new(AtomicU8::new(ConnectionState::Idle as u8)),
        }
    }

    /// Handle other threads use to observe the current state.
    pub fn published_state(&self) -> Arc<AtomicU8> {
        Arc::clone(&self.published)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The wire profile resolved for the current peer.
    pub fn profile(&self) -> &'static WireProfile {
        self.profile
    }

    /// The endpoint of the current or most recent connection.
    pub fn endpoint(&self) -> Option<SocketAddr> {
        self.endpoint
    }

    fn set_state(&mut self, next: ConnectionState) {
        trace!(from = ?self.state, to = ?next, "connection state transition");
        self.state = next;
        self.published.store(next as u8, Ordering::Release);
    }

    /// Attempt one connection to `addr`.
    ///
    /// Reconnecting to the same endpoint while already connected is a
    /// successful no-op. A different endpoint tears the old connection down
    /// first. Exactly one transport attempt is made per call; both timeout
    /// and refusal come back as recoverable errors.
    pub fn connect(&mut self, addr: SocketAddr) -> Result<()> {
        if self.state == ConnectionState::Connected {
            if self.endpoint == Some(addr) {
                debug!(%addr, "already connected, nothing to do");
                return Ok(());
            }
            self.disconnect();
        }

        self.endpoint = Some(addr);
        self.set_state(ConnectionState::Connecting);

        let tcp = match TcpStream::connect_timeout(&addr, self.config.connect_timeout) {
            Ok(stream) => stream,
            Err(err) => {
                self.set_state(ConnectionState::Idle);
                let transport = classify_connect_error(addr, err);
                warn!(%addr, error = %transport, "connect attempt failed");
                return Err(transport.into());
            }
        };

        self.profile = (self.config.profile_selector)(addr.ip());
        if let Err(err) = self.classify_endpoints(tcp, addr) {
            self.teardown();
            self.set_state(ConnectionState::Idle);
            return Err(err);
        }

        self.set_state(ConnectionState::Connected);
        info!(%addr, profile = self.profile.name, "link connected");
        Ok(())
    }

    /// Assign the readable/writable endpoints per the configured transport
    /// mode and apply the readiness-wait read timeout.
    fn classify_endpoints(&mut self, tcp: TcpStream, addr: SocketAddr) -> Result<()> {
        match self.config.transport {
            TransportMode::Tcp => {
                tcp.set_read_timeout(Some(self.config.read_timeout))
                    .map_err(TransportError::Io)?;
                debug!("transmitting and receiving on tcp");
            }
            TransportMode::TcpWithUdpData => {
                let udp = UdpSocket::bind(unspecified_for(addr)).map_err(TransportError::Io)?;
                udp.set_read_timeout(Some(self.config.read_timeout))
                    .map_err(TransportError::Io)?;
                debug!("transmitting on tcp, receiving on udp");
                self.udp_buf = vec![0; self.config.max_payload_size + self.profile.header_size];
                self.udp = Some(udp);
            }
        }
        self.tcp = Some(tcp);
        Ok(())
    }

    /// Close both sockets and return to `Idle`. Idempotent.
    pub fn disconnect(&mut self) {
        if self.state == ConnectionState::Idle {
            return;
        }
        self.set_state(ConnectionState::Disconnecting);
        warn!("link disconnecting");
        self.teardown();
        self.set_state(ConnectionState::Idle);
    }

    fn teardown(&mut self) {
        // Dropping the handles closes the sockets; fresh ones are created
        // on the next connect, so no stale state survives.
        self.tcp = None;
        self.udp = None;
        self.udp_buf = Vec::new();
    }

    /// Read one chunk from the inbound endpoint into `buf`.
    ///
    /// `Ok(0)` means the readiness wait elapsed with no data. A zero-length
    /// TCP read is the peer closing and comes back as
    /// [`TransportError::PeerClosed`].
    pub fn recv_chunk(&mut self, buf: &mut BytesMut) -> Result<usize> {
        if let Some(udp) = &self.udp {
            match udp.recv(&mut self.udp_buf) {
                Ok(n) => {
                    buf.extend_from_slice(&self.udp_buf[..n]);
                    Ok(n)
                }
                Err(err) if is_wait_elapsed(&err) => Ok(0),
                Err(err) => Err(TransportError::Io(err).into()),
            }
        } else if let Some(tcp) = &mut self.tcp {
            let mut chunk = [0u8; RECV_CHUNK];
            match tcp.read(&mut chunk) {
                Ok(0) => Err(TransportError::PeerClosed.into()),
                Ok(n) => {
                    buf.extend_from_slice(&chunk[..n]);
                    Ok(n)
                }
                Err(err) if is_wait_elapsed(&err) => Ok(0),
                Err(err) => Err(TransportError::Io(err).into()),
            }
        } else {
            Err(LinkError::NotConnected)
        }
    }

    /// Write a complete buffer to the writable endpoint.
    pub fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let tcp = self.tcp.as_mut().ok_or(LinkError::NotConnected)?;
        tcp.write_all(bytes).map_err(TransportError::Io)?;
        tcp.flush().map_err(TransportError::Io)?;
        Ok(())
    }

    #[cfg(test)]
    fn has_sockets(&self) -> bool {
        self.tcp.is_some() || self.udp.is_some()
    }

    #[cfg(test)]
    fn local_addr(&self) -> Option<SocketAddr> {
        self.tcp.as_ref().and_then(|tcp| tcp.local_addr().ok())
    }
}

fn is_wait_elapsed(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}

/// Sort a failed connect attempt into the recoverable taxonomy: timeouts
/// are reported distinctly so callers can tell a dead stand from a refused
/// or unreachable one. Both are retryable.
fn classify_connect_error(addr: SocketAddr, err: std::io::Error) -> TransportError {
    if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) {
        TransportError::ConnectTimeout { addr }
    } else {
        TransportError::ConnectFailed { addr, source: err }
    }
}

/// The unspecified bind address matching the peer's address family.
fn unspecified_for(peer: SocketAddr) -> SocketAddr {
    match peer {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, peer.port()).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, peer.port()).into(),
    }
}
