//! Link connectivity probes.

use core::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// Tells whether the network the sync group lives on is currently reachable.
///
/// Polled on every [`SyncSession::read`](crate::SyncSession::read), so it
/// should be cheap.
pub trait Connectivity {
    fn is_connected(&mut self) -> bool;
}

impl<F: FnMut() -> bool> Connectivity for F {
    #[inline(always)]
    fn is_connected(&mut self) -> bool {
        self()
    }
}

/// Assumes the network is always up. Useful for wired or loopback setups.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConnected;

impl Connectivity for AlwaysConnected {
    #[inline(always)]
    fn is_connected(&mut self) -> bool {
        true
    }
}

/// Considers the network up whenever the OS has a route, and a local address,
/// to reach the sync group.
///
/// No packets are sent: "connecting" a UDP socket only performs the route lookup.
#[derive(Debug, Clone, Copy)]
pub struct RouteProbe {
    target: SocketAddrV4,
}

impl RouteProbe {
    #[inline(always)]
    pub const fn new(group: Ipv4Addr, port: u16) -> Self {
        Self {
            target: SocketAddrV4::new(group, port),
        }
    }

    fn probe(&self) -> std::io::Result<bool> {
        let sock = std::net::UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))?;
        sock.connect(self.target)?;

        Ok(match sock.local_addr()? {
            SocketAddr::V4(addr) => !addr.ip().is_unspecified(),
            SocketAddr::V6(_) => false,
        })
    }
}

impl Connectivity for RouteProbe {
    fn is_connected(&mut self) -> bool {
        self.probe().unwrap_or_else(|e| {
            log::trace!("no route to {}: {e}", self.target);
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_probes() {
        let mut up = false;
        let mut toggle = move || {
            up = !up;
            up
        };

        assert!(toggle.is_connected());
        assert!(!toggle.is_connected());
        assert!(AlwaysConnected.is_connected());
    }
}
