//! Startup port selection.
//!
//! Walks a port range in order and keeps the first port that binds. Ports
//! that are taken (in use, or not permitted) are skipped; any other bind
//! failure aborts startup.

use sjmp_core::{Result, SjmpError};
use std::io;
use std::net::{IpAddr, SocketAddr, TcpListener};
use tracing::{debug, info};

/// Try `try_bind` on every port in `[start, end]` and return the first
/// success together with its port.
pub fn bind_first_free<L>(
    start: u16,
    end: u16,
    mut try_bind: impl FnMut(u16) -> io::Result<L>,
) -> Result<(u16, L)> {
    if start > end {
        return Err(SjmpError::Config {
            message: format!("port range start {} is greater than end {}", start, end),
        });
    }

    for port in start..=end {
        match try_bind(port) {
            Ok(listener) => {
                info!("Listening TCP port {}", port);
                return Ok((port, listener));
            }
            Err(e) if is_port_taken(&e) => {
                debug!("Can not bind to port {} ({}), trying next", port, e);
            }
            Err(e) => return Err(SjmpError::Bind { port, source: e }),
        }
    }

    Err(SjmpError::PortRangeExhausted { start, end })
}

/// Bind a non-blocking TCP listener on the first free port of the range.
pub fn bind_tcp(host: IpAddr, start: u16, end: u16) -> Result<(u16, TcpListener)> {
    bind_first_free(start, end, |port| {
        let listener = TcpListener::bind(SocketAddr::new(host, port))?;
        listener.set_nonblocking(true)?;
        Ok(listener)
    })
}

fn is_port_taken(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::AddrInUse | io::ErrorKind::PermissionDenied
    )
}
