//! Ground-station telemetry link for a rocket test-stand data acquisition
//! unit.
//!
//! The link connects an operator console to the remote stand over a socket
//! connection: connection lifecycle, compact binary framing, fixed-layout
//! payload decoding with per-channel linear calibration, and routing of
//! decoded samples to per-channel sinks. One background worker thread owns
//! the sockets and the whole decode pipeline; consumers interact through
//! the [`TelemetryLink`] handle and poll bounded queues on their own
//! cadence.
//!
//! UI concerns (plotting, window layout, config files) live elsewhere and
//! talk to this crate only through the handle.

pub mod calibration;
pub mod config;
pub mod connection;
pub mod error;
pub mod link;
pub mod router;
mod worker;

pub use calibration::CalibrationTable;
pub use config::{LinkConfig, TransportMode};
pub use connection::ConnectionState;
pub use error::{LinkError, Result, TransportError};
pub use link::{CalibratedSample, TelemetryLink};
pub use router::{route, RouteTarget};

pub use groundlink_wire as wire;
