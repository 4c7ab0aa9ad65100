//! Multicast membership tracking across connectivity changes.

use core::net::Ipv4Addr;

use crate::{SyncError, Transport};

/// Whether the session currently holds a multicast membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkState {
    Connected,
    #[default]
    Disconnected,
}

/// What a call to [`NetworkLifecycleManager::reconcile`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reconciled {
    /// Nothing changed, nothing was touched.
    Unchanged,
    /// The network came up, and the group was (re)joined.
    Joined,
    /// The network went down, and the transport was closed.
    Left,
}

/// Keeps the transport's group membership in line with network connectivity.
///
/// Reconciling is idempotent and cheap, it is meant to run on every poll. There is
/// no backoff: a failed join simply gets retried on the next poll.
#[derive(Debug, Clone)]
pub struct NetworkLifecycleManager {
    group: Ipv4Addr,
    port: u16,
    state: LinkState,
}

impl NetworkLifecycleManager {
    #[inline(always)]
    pub const fn new(group: Ipv4Addr, port: u16) -> Self {
        Self {
            group,
            port,
            state: LinkState::Disconnected,
        }
    }

    #[inline(always)]
    pub const fn state(&self) -> LinkState {
        self.state
    }

    #[inline(always)]
    pub const fn is_connected(&self) -> bool {
        matches!(self.state, LinkState::Connected)
    }

    /// Closes any stale handle and joins the group.
    ///
    /// On failure, the state is left disconnected.
    pub fn join(&mut self, transport: &mut impl Transport) -> Result<(), SyncError> {
        transport.close();

        match transport.bind_multicast(self.group, self.port) {
            Ok(()) => {
                self.state = LinkState::Connected;
                log::info!("joined sync group {}:{}", self.group, self.port);
                Ok(())
            }
            Err(e) => {
                self.state = LinkState::Disconnected;
                Err(SyncError::Bind(e))
            }
        }
    }

    /// Closes the transport.
    pub fn leave(&mut self, transport: &mut impl Transport) {
        transport.close();

        if self.is_connected() {
            log::info!("left sync group {}:{}", self.group, self.port);
        }

        self.state = LinkState::Disconnected;
    }

    /// Acts on a connectivity observation.
    ///
    /// Only transitions touch the transport:
    ///
    /// - link up while disconnected: join (see [`join`](Self::join))
    /// - link down while connected: leave
    pub fn reconcile(
        &mut self,
        link_up: bool,
        transport: &mut impl Transport,
    ) -> Result<Reconciled, SyncError> {
        match (self.state, link_up) {
            (LinkState::Disconnected, true) => self.join(transport).map(|()| Reconciled::Joined),
            (LinkState::Connected, false) => {
                self.leave(transport);
                Ok(Reconciled::Left)
            }
            _ => Ok(Reconciled::Unchanged),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::net::SocketAddr;
    use std::io;

    #[derive(Default)]
    struct CountingTransport {
        binds: usize,
        closes: usize,
        fail_bind: bool,
    }

    impl Transport for CountingTransport {
        fn bind_multicast(&mut self, _group: Ipv4Addr, _port: u16) -> io::Result<()> {
            self.binds += 1;

            if self.fail_bind {
                Err(io::ErrorKind::AddrNotAvailable.into())
            } else {
                Ok(())
            }
        }

        fn send_datagram(&mut self, _bytes: &[u8]) -> io::Result<()> {
            Ok(())
        }

        fn poll_pending(&mut self) -> Option<usize> {
            None
        }

        fn receive_into(&mut self, _buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            Err(io::ErrorKind::WouldBlock.into())
        }

        fn discard_pending(&mut self) {}

        fn close(&mut self) {
            self.closes += 1;
        }
    }

    fn manager() -> NetworkLifecycleManager {
        NetworkLifecycleManager::new(crate::proto::MULTICAST_GROUP, crate::proto::SYNC_PORT)
    }

    #[test]
    fn steady_state_is_idempotent() {
        let mut lifecycle = manager();
        let mut transport = CountingTransport::default();

        assert_eq!(
            lifecycle.reconcile(true, &mut transport).unwrap(),
            Reconciled::Joined
        );
        assert_eq!((transport.binds, transport.closes), (1, 1));

        for _ in 0..10 {
            assert_eq!(
                lifecycle.reconcile(true, &mut transport).unwrap(),
                Reconciled::Unchanged
            );
        }
        assert_eq!((transport.binds, transport.closes), (1, 1));

        assert_eq!(
            lifecycle.reconcile(false, &mut transport).unwrap(),
            Reconciled::Left
        );
        assert!(!lifecycle.is_connected());

        for _ in 0..10 {
            assert_eq!(
                lifecycle.reconcile(false, &mut transport).unwrap(),
                Reconciled::Unchanged
            );
        }
        assert_eq!((transport.binds, transport.closes), (1, 2));
    }

    #[test]
    fn failed_join_is_retried_next_poll() {
        let mut lifecycle = manager();
        let mut transport = CountingTransport {
            fail_bind: true,
            ..Default::default()
        };

        assert!(matches!(
            lifecycle.reconcile(true, &mut transport),
            Err(SyncError::Bind(_))
        ));
        assert_eq!(lifecycle.state(), LinkState::Disconnected);

        transport.fail_bind = false;

        assert_eq!(
            lifecycle.reconcile(true, &mut transport).unwrap(),
            Reconciled::Joined
        );
        assert!(lifecycle.is_connected());
        assert_eq!(transport.binds, 2);
    }

    #[test]
    fn rejoins_after_outage() {
        let mut lifecycle = manager();
        let mut transport = CountingTransport::default();

        lifecycle.join(&mut transport).unwrap();
        lifecycle.reconcile(false, &mut transport).unwrap();

        assert_eq!(
            lifecycle.reconcile(true, &mut transport).unwrap(),
            Reconciled::Joined
        );
        assert_eq!(transport.binds, 2);
    }
}
