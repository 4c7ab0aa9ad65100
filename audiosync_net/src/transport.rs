//! Datagram transports a session can run on.

use core::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::io;

/// A multicast datagram endpoint.
///
/// The protocol logic only ever talks to this trait. Platform differences in how
/// a group is joined are a matter of which implementation is plugged in.
///
/// Implementations must be non-blocking: [`poll_pending`](Self::poll_pending)
/// reports what is already queued, it never waits.
pub trait Transport {
    /// Joins the multicast group, replacing any previous membership.
    fn bind_multicast(&mut self, group: Ipv4Addr, port: u16) -> io::Result<()>;

    /// Sends `bytes` as a single datagram to the joined group.
    fn send_datagram(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Size of the next queued datagram, if any.
    fn poll_pending(&mut self) -> Option<usize>;

    /// Dequeues the next datagram into `buf`, returning its size and sender.
    fn receive_into(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// Dequeues the next datagram without looking at it.
    fn discard_pending(&mut self);

    /// Leaves the group and releases the endpoint. Does nothing if not bound.
    fn close(&mut self);
}

/// Largest UDP payload fitting in a standard ethernet frame.
const MAX_DATAGRAM_SIZE: usize = 1472;

#[derive(Debug)]
struct Membership {
    sock: std::net::UdpSocket,
    group: SocketAddrV4,
}

/// A [`Transport`] over a non-blocking [`std::net::UdpSocket`].
///
/// Multicast loopback is enabled, so a node receives its own broadcasts like any
/// other member of the group.
#[derive(Debug)]
pub struct UdpMulticastTransport {
    interface: Ipv4Addr,
    membership: Option<Membership>,
    peek_buf: Box<[u8; MAX_DATAGRAM_SIZE]>,
}

impl Default for UdpMulticastTransport {
    fn default() -> Self {
        Self::new(Ipv4Addr::UNSPECIFIED)
    }
}

impl UdpMulticastTransport {
    /// Creates an unbound transport joining groups on `interface`.
    /// [`Ipv4Addr::UNSPECIFIED`] lets the OS choose.
    #[inline]
    pub fn new(interface: Ipv4Addr) -> Self {
        Self {
            interface,
            membership: None,
            peek_buf: Box::new([0; MAX_DATAGRAM_SIZE]),
        }
    }

    #[inline(always)]
    pub fn is_bound(&self) -> bool {
        self.membership.is_some()
    }

    /// The local address of the underlying socket, if bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.membership
            .as_ref()
            .and_then(|m| m.sock.local_addr().ok())
    }

    #[inline(always)]
    fn membership(&self) -> io::Result<&Membership> {
        self.membership
            .as_ref()
            .ok_or_else(|| io::ErrorKind::NotConnected.into())
    }
}

impl Transport for UdpMulticastTransport {
    fn bind_multicast(&mut self, group: Ipv4Addr, port: u16) -> io::Result<()> {
        self.close();

        let sock = std::net::UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))?;
        sock.join_multicast_v4(&group, &self.interface)?;
        sock.set_multicast_loop_v4(true)?;
        // stay on the local network
        sock.set_multicast_ttl_v4(1)?;
        sock.set_nonblocking(true)?;

        self.membership = Some(Membership {
            sock,
            group: SocketAddrV4::new(group, port),
        });

        Ok(())
    }

    fn send_datagram(&mut self, bytes: &[u8]) -> io::Result<()> {
        let Membership { sock, group } = self.membership()?;

        if sock.send_to(bytes, *group)? != bytes.len() {
            Err(io::ErrorKind::WriteZero.into())
        } else {
            Ok(())
        }
    }

    fn poll_pending(&mut self) -> Option<usize> {
        let sock = &self.membership.as_ref()?.sock;

        // Datagrams larger than the buffer are reported truncated, which is
        // still far beyond anything the protocol accepts.
        match peeked(sock.peek_from(self.peek_buf.as_mut_slice())) {
            Peeked::Datagram(n) => Some(n),
            Peeked::Empty => None,
            Peeked::Unreadable => {
                // e.g. oversized datagrams on Windows, which would otherwise
                // stay at the head of the queue forever
                self.discard_pending();
                None
            }
        }
    }

    fn receive_into(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.membership()?.sock.recv_from(buf)
    }

    fn discard_pending(&mut self) {
        if let Some(Membership { sock, .. }) = &self.membership {
            // the rest of the datagram is dropped by the OS
            let _ = sock.recv(&mut [0; 1]);
        }
    }

    fn close(&mut self) {
        if let Some(Membership { sock, group }) = self.membership.take() {
            let _ = sock.leave_multicast_v4(group.ip(), &self.interface);
        }
    }
}

/// Outcome of peeking at the head of a socket's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Peeked {
    Datagram(usize),
    Empty,
    /// Something is queued, but can't be peeked at. It has to be dropped.
    Unreadable,
}

fn peeked(res: io::Result<(usize, SocketAddr)>) -> Peeked {
    match res {
        Ok((n, _)) => Peeked::Datagram(n),
        Err(e) if crate::io_err_is_timeout(e.kind()) => Peeked::Empty,
        Err(e) => {
            log::debug!("peeking sync socket failed: {e}");
            Peeked::Unreadable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn wait_pending(transport: &mut UdpMulticastTransport) -> Option<usize> {
        (0..100).find_map(|_| {
            let pending = transport.poll_pending();

            if pending.is_none() {
                std::thread::sleep(Duration::from_millis(10));
            }

            pending
        })
    }

    #[test]
    fn peek_failures_are_dropped() {
        let source = SocketAddr::from((Ipv4Addr::LOCALHOST, 4000));

        assert_eq!(peeked(Ok((44, source))), Peeked::Datagram(44));
        assert_eq!(
            peeked(Err(io::ErrorKind::WouldBlock.into())),
            Peeked::Empty
        );
        assert_eq!(peeked(Err(io::ErrorKind::TimedOut.into())), Peeked::Empty);
        // WSAEMSGSIZE
        assert_eq!(
            peeked(Err(io::Error::other("message too long"))),
            Peeked::Unreadable
        );
    }

    #[test]
    #[ignore = "needs a multicast capable interface"]
    fn drains_real_datagrams() {
        let mut transport = UdpMulticastTransport::default();
        transport
            .bind_multicast(crate::proto::MULTICAST_GROUP, 0)
            .unwrap();

        let port = transport.local_addr().unwrap().port();
        let dest = SocketAddrV4::new(Ipv4Addr::LOCALHOST, port);

        let peer = std::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        peer.send_to(&[0xAA; 2000], dest).unwrap();
        peer.send_to(b"00002\0 hello", dest).unwrap();

        // truncated on peek, or already dropped where peeking it fails
        match wait_pending(&mut transport) {
            Some(12) => {}
            Some(n) => {
                assert!(n > crate::proto::MAX_PACKET_LEN);
                transport.discard_pending();
            }
            None => panic!("nothing arrived"),
        }

        assert_eq!(wait_pending(&mut transport), Some(12));

        let mut buf = [0; crate::proto::MAX_PACKET_LEN];
        let (n, from) = transport.receive_into(&mut buf).unwrap();

        assert_eq!(&buf[..n], b"00002\0 hello");
        assert_eq!(from, peer.local_addr().unwrap());
        assert_eq!(transport.poll_pending(), None);

        transport.close();
        assert!(!transport.is_bound());
    }

    #[test]
    fn unbound_transport_is_inert() {
        let mut transport = UdpMulticastTransport::default();

        assert!(!transport.is_bound());
        assert_eq!(transport.poll_pending(), None);
        assert_eq!(
            transport.send_datagram(b"00002").unwrap_err().kind(),
            io::ErrorKind::NotConnected
        );
        assert_eq!(
            transport.receive_into(&mut [0; 8]).unwrap_err().kind(),
            io::ErrorKind::NotConnected
        );

        // no-ops
        transport.discard_pending();
        transport.close();
        assert!(!transport.is_bound());
    }
}
