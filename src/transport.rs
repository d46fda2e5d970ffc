use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Instant;

use crate::error::{Error, Result};

/// Upper bound on a received datagram.
///
/// IPMI LAN packets are bounded well below this; a fixed buffer keeps the
/// receive path allocation-free.
pub(crate) const MAX_PACKET_SIZE: usize = 512;

/// Default RMCP port. The secondary "RMCP-secure" port 664 is not used.
pub const DEFAULT_PORT: u16 = 623;

/// A datagram transport for exchanging RMCP/RMCP+ packets with a BMC.
///
/// A transport logically represents a UDP socket and a receive buffer.
/// Access must be serialised: callers must not overlap `send_recv` calls on
/// the same transport.
pub trait Transport {
    /// Send one datagram and block until one datagram is received, which is
    /// then returned. Fails with [`Error::Timeout`] if the deadline expires
    /// during either phase.
    fn send_recv(&mut self, deadline: Instant, request: &[u8]) -> Result<&[u8]>;

    /// The remote `IP:port` of the endpoint.
    fn peer_addr(&self) -> Result<SocketAddr>;
}

/// Blocking UDP transport.
pub struct UdpTransport {
    socket: UdpSocket,
    recv_buf: [u8; MAX_PACKET_SIZE],
}

impl UdpTransport {
    /// Connect a UDP socket to a BMC at `host[:port]`, defaulting the port
    /// to 623 when absent. IPv6 addresses must be enclosed in square
    /// brackets.
    pub fn connect(addr: &str) -> Result<Self> {
        let target = resolve(addr)?;
        let bind_addr = match target {
            SocketAddr::V4(_) => "0.0.0.0:0",
            SocketAddr::V6(_) => "[::]:0",
        };

        let socket = UdpSocket::bind(bind_addr)?;
        socket.connect(target)?;

        Ok(Self {
            socket,
            recv_buf: [0u8; MAX_PACKET_SIZE],
        })
    }

    fn remaining(deadline: Instant) -> Result<std::time::Duration> {
        let now = Instant::now();
        if deadline <= now {
            return Err(Error::Timeout);
        }
        Ok(deadline - now)
    }
}

impl Transport for UdpTransport {
    fn send_recv(&mut self, deadline: Instant, request: &[u8]) -> Result<&[u8]> {
        self.socket
            .set_write_timeout(Some(Self::remaining(deadline)?))?;
        let written = self.socket.send(request)?;
        if written != request.len() {
            return Err(Error::Protocol("wrote incomplete datagram"));
        }
        crate::observe::record_transmit(request.len());

        self.socket
            .set_read_timeout(Some(Self::remaining(deadline)?))?;
        let n = match self.socket.recv(&mut self.recv_buf) {
            Ok(n) => n,
            Err(e) if is_timeout(&e) => return Err(Error::Timeout),
            Err(e) => return Err(Error::Io(e)),
        };
        crate::observe::record_receive(n);

        Ok(&self.recv_buf[..n])
    }

    fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.peer_addr()?)
    }
}

/// Resolve `host[:port]`, appending the default RMCP port when absent.
fn resolve(addr: &str) -> Result<SocketAddr> {
    let candidate = if needs_default_port(addr) {
        format!("{addr}:{DEFAULT_PORT}")
    } else {
        addr.to_string()
    };

    candidate
        .to_socket_addrs()?
        .next()
        .ok_or(Error::InvalidArgument("could not resolve BMC address"))
}

fn needs_default_port(addr: &str) -> bool {
    if addr.ends_with(']') {
        // bracketed IPv6 without a port
        return true;
    }
    match addr.matches(':').count() {
        0 => true,
        1 => false,
        // multiple colons: bare IPv6 unless bracketed with a trailing port
        _ => !addr.contains(']'),
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_applied() {
        assert!(needs_default_port("10.0.0.1"));
        assert!(needs_default_port("bmc.rack1.example.com"));
        assert!(!needs_default_port("10.0.0.1:624"));
        assert!(needs_default_port("[fe80::1]"));
        assert!(!needs_default_port("[fe80::1]:623"));
        assert!(needs_default_port("fe80::1"));
    }

    #[test]
    fn resolve_appends_port() {
        let addr = resolve("127.0.0.1").expect("resolve");
        assert_eq!(addr.port(), DEFAULT_PORT);

        let addr = resolve("127.0.0.1:624").expect("resolve");
        assert_eq!(addr.port(), 624);
    }
}
