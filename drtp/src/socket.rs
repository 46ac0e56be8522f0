//! Datagram channel abstraction and its UDP implementation.
//!
//! The protocol engine talks to a [`Channel`]: something that moves whole
//! datagrams and may lose, duplicate, or reorder them.  [`Socket`] is a thin
//! wrapper around `tokio::net::UdpSocket`; [`crate::simulator::Simulator`]
//! wraps any channel with fault injection.  Timeouts are applied by the caller
//! (`tokio::time::timeout`), so `recv` itself may wait forever.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::packet::MAX_PACKET_LEN;

/// A message-oriented, unreliable transport.
pub trait Channel {
    /// Send one datagram to the current peer.
    fn send(&mut self, bytes: &[u8]) -> impl Future<Output = io::Result<()>>;

    /// Receive the next datagram from the current peer (at most
    /// [`MAX_PACKET_LEN`] bytes).
    fn recv(&mut self) -> impl Future<Output = io::Result<Vec<u8>>>;

    /// Release the current peer.  A listening channel accepts a new peer on
    /// the next `recv`.
    fn close(&mut self);
}

/// An async UDP socket bound to at most one peer at a time.
///
/// A client socket is pointed at the server with [`Socket::connect_to`].  A
/// listening socket adopts the source address of the first datagram it
/// receives and ignores every other address until [`Channel::close`].
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
    peer: Option<SocketAddr>,
    /// Fixed peer set by `connect_to`; kept across `close`.
    fixed_peer: bool,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing `127.0.0.1:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> io::Result<Self> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self {
            local_addr,
            inner,
            peer: None,
            fixed_peer: false,
        })
    }

    /// Send every datagram to `peer` and accept replies only from it.
    pub fn connect_to(&mut self, peer: SocketAddr) {
        self.peer = Some(peer);
        self.fixed_peer = true;
    }

    /// The peer this socket currently talks to.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }
}

impl Channel for Socket {
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let peer = self
            .peer
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no peer to send to"))?;
        self.inner.send_to(bytes, peer).await?;
        Ok(())
    }

    async fn recv(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; MAX_PACKET_LEN];
        loop {
            let (n, addr) = self.inner.recv_from(&mut buf).await?;
            match self.peer {
                None => {
                    log::debug!("[udp] adopting peer {addr}");
                    self.peer = Some(addr);
                }
                Some(peer) if peer != addr => {
                    log::debug!("[udp] ignoring {n} bytes from stranger {addr}");
                    continue;
                }
                Some(_) => {}
            }
            buf.truncate(n);
            return Ok(buf);
        }
    }

    fn close(&mut self) {
        if !self.fixed_peer {
            self.peer = None;
        }
    }
}
