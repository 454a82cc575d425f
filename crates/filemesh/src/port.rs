//! Local service port discovery.

use std::net::{Ipv4Addr, TcpListener};

use tracing::debug;

use crate::error::{FilemeshError, Result};

/// First port a peer tries to serve on.
pub const DEFAULT_BASE_PORT: u16 = 8000;

/// First port at or above `start` that can be bound on all interfaces.
///
/// The probe listener is closed again before returning, so another process
/// can still take the port before the caller binds it.
pub fn next_available_port(start: u16) -> Result<u16> {
    for port in start..=u16::MAX {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)) {
            Ok(_) => return Ok(port),
            Err(e) => debug!(port, error = %e, "port unavailable"),
        }
    }
    Err(FilemeshError::NoFreePort { start })
}
