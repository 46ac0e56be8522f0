//! Per-connection lifecycle manager.
//!
//! A [`Connection`] owns the complete state for one logical peer-to-peer
//! session.  Its responsibilities are:
//! - Driving the finite-state machine (see [`crate::state`]) through the
//!   three-way handshake and the two-way, client-initiated teardown.
//! - Framing: every datagram is decoded here; runts are dropped with a debug
//!   log and never reach the protocol logic.
//! - Holding the [`RetransmitTimer`] that the data phase feeds with samples.
//!
//! Connections are created either by an active open ([`Connection::connect`],
//! client side) or by accepting a peer's SYN ([`Connection::accept`], server
//! side).  Method negotiation ([`crate::negotiate`]) and the data phase
//! ([`crate::transfer`]) run on top of an established connection.

use std::io;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use crate::config::Method;
use crate::error::DrtpError;
use crate::packet::{Packet, PacketKind};
use crate::socket::Channel;
use crate::state::{ConnectionState, Role};
use crate::timer::{RetransmitTimer, TimerConfig};

/// How many times a FIN is re-sent before the sender gives up and closes.
pub const TEARDOWN_RETRIES: u32 = 5;

/// Result of the sender's teardown attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinOutcome {
    /// The FIN was acknowledged, or retries ran out and the connection was
    /// force-closed.
    Closed,
    /// The receiver is still missing this sequence; resume the transfer.
    Rewind(u32),
}

/// A handle to a single reliable connection over a datagram [`Channel`].
pub struct Connection<'a, C: Channel> {
    channel: &'a mut C,
    pub role: Role,
    /// Current FSM state.
    pub state: ConnectionState,
    /// Strategy agreed during negotiation; `None` until then.
    pub method: Option<Method>,
    /// Window configured by the client and carried in the SYN.
    pub window: u16,
    pub timer: RetransmitTimer,
    /// A packet that arrived early and is handed out by the next receive.
    pending: Option<Packet>,
}

impl<'a, C: Channel> Connection<'a, C> {
    fn new(channel: &'a mut C, role: Role, window: u16, timer: TimerConfig) -> Self {
        let state = match role {
            Role::Sender => ConnectionState::Closed,
            Role::Receiver => ConnectionState::Listen,
        };
        Self {
            channel,
            role,
            state,
            method: None,
            window: window.max(1),
            timer: RetransmitTimer::new(timer),
            pending: None,
        }
    }

    /// Active open (client side).
    ///
    /// Sends `SYN` advertising `window`, waits one baseline timeout for
    /// `SYN|ACK`, then completes the handshake with an ACK.  There is no
    /// automatic retry: silence yields [`DrtpError::HandshakeTimeout`].
    pub async fn connect(
        channel: &'a mut C,
        window: u16,
        timer: TimerConfig,
    ) -> Result<Self, DrtpError> {
        let mut conn = Self::new(channel, Role::Sender, window, timer);

        let syn = Packet::syn(conn.window);
        conn.send(&syn).await?;
        conn.state = ConnectionState::SynSent;
        log::debug!("[hs] → SYN win={}", conn.window);

        let deadline = Instant::now() + conn.timer.baseline();
        loop {
            match conn.recv_until(deadline).await? {
                Some(pkt) if pkt.kind() == PacketKind::SynAck => break,
                Some(pkt) => log::debug!("[hs] ignoring {:?} in {}", pkt.kind(), conn.state),
                None => {
                    let state = conn.state;
                    conn.close();
                    return Err(DrtpError::HandshakeTimeout { state });
                }
            }
        }
        log::debug!("[hs] ← SYN|ACK");

        let ack = Packet::ack(1, conn.window);
        conn.send(&ack).await?;
        conn.state = ConnectionState::Established;
        log::info!("[hs] connection established (window {})", conn.window);
        Ok(conn)
    }

    /// Passive open (server side).
    ///
    /// Waits in `LISTEN` for a `SYN` with `seq == 1`, replies `SYN|ACK`, and
    /// waits one baseline timeout for the final ACK.  Anything else seen
    /// while listening is discarded and the channel's peer released, so a
    /// straggler from an earlier connection cannot pin the listener.
    ///
    /// A method proposal overtaking the final ACK completes the handshake
    /// too; it is kept for [`crate::negotiate::agree_method`].
    pub async fn accept(channel: &'a mut C, timer: TimerConfig) -> Result<Self, DrtpError> {
        let mut conn = Self::new(channel, Role::Receiver, 1, timer);

        let window = loop {
            let bytes = conn.channel.recv().await?;
            match Packet::decode(&bytes) {
                Ok(pkt) if pkt.kind() == PacketKind::Syn && pkt.header.seq == 1 => {
                    break pkt.header.window;
                }
                Ok(pkt) => log::debug!("[hs] ignoring {:?} while listening", pkt.kind()),
                Err(e) => log::debug!("[hs] discarding datagram: {e}"),
            }
            conn.channel.close();
        };
        conn.window = window.max(1);
        conn.state = ConnectionState::SynReceived;
        log::debug!("[hs] ← SYN win={window}");

        let syn_ack = Packet::syn_ack(conn.window);
        conn.send(&syn_ack).await?;
        log::debug!("[hs] → SYN|ACK");

        let deadline = Instant::now() + conn.timer.baseline();
        loop {
            match conn.recv_until(deadline).await? {
                Some(pkt) if pkt.kind() == PacketKind::Ack(1) => break,
                Some(pkt) if pkt.kind() == PacketKind::Data(0) => {
                    log::debug!("[hs] ← METHOD before final ACK");
                    conn.pending = Some(pkt);
                    break;
                }
                Some(pkt) => log::debug!("[hs] ignoring {:?} in {}", pkt.kind(), conn.state),
                None => {
                    let state = conn.state;
                    conn.close();
                    return Err(DrtpError::HandshakeTimeout { state });
                }
            }
        }
        conn.state = ConnectionState::Established;
        log::info!("[hs] connection established (window {})", conn.window);
        Ok(conn)
    }

    /// Encode and send one packet.
    pub async fn send(&mut self, pkt: &Packet) -> Result<(), DrtpError> {
        self.channel.send(&pkt.encode()).await?;
        Ok(())
    }

    /// Next well-formed packet, or `None` once `deadline` passes.
    ///
    /// Datagrams shorter than a header are dropped here.
    pub async fn recv_until(&mut self, deadline: Instant) -> Result<Option<Packet>, DrtpError> {
        if let Some(pkt) = self.pending.take() {
            return Ok(Some(pkt));
        }
        loop {
            let bytes = match timeout_at(deadline, self.channel.recv()).await {
                Err(_elapsed) => return Ok(None),
                Ok(Ok(bytes)) => bytes,
                // ICMP unreachable surfaced by some platforms; the peer may
                // still come up, the deadline decides.
                Ok(Err(e))
                    if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
                    ) =>
                {
                    log::debug!("transient receive error: {e}");
                    continue;
                }
                Ok(Err(e)) => return Err(e.into()),
            };
            match Packet::decode(&bytes) {
                Ok(pkt) => return Ok(Some(pkt)),
                Err(e) => log::debug!("discarding datagram: {e}"),
            }
        }
    }

    /// [`recv_until`](Self::recv_until) with a relative timeout.
    pub async fn recv_within(&mut self, wait: Duration) -> Result<Option<Packet>, DrtpError> {
        self.recv_until(Instant::now() + wait).await
    }

    /// Sender teardown: send `FIN` with `seq = fin_seq` until acknowledged.
    ///
    /// A DUPACK below `fin_seq` means the receiver is still missing data; the
    /// caller resumes from the returned [`FinOutcome::Rewind`] sequence.
    /// After [`TEARDOWN_RETRIES`] unanswered re-sends the connection is
    /// force-closed.
    pub async fn finish(&mut self, fin_seq: u32) -> Result<FinOutcome, DrtpError> {
        let fin = Packet::fin(fin_seq, self.window);
        self.state = ConnectionState::FinSent;

        for attempt in 0..=TEARDOWN_RETRIES {
            self.send(&fin).await?;
            log::debug!("[hs] → FIN seq={fin_seq} attempt={attempt}");

            let deadline = Instant::now() + self.timer.rto();
            while let Some(pkt) = self.recv_until(deadline).await? {
                match pkt.kind() {
                    PacketKind::FinAck(seq) if seq == fin_seq => {
                        log::info!("[hs] ← FIN-ACK; connection closed");
                        self.close();
                        return Ok(FinOutcome::Closed);
                    }
                    PacketKind::DupAck(seq) if seq < fin_seq => {
                        log::debug!("[hs] ← DUPACK seq={seq} during teardown; resuming");
                        self.state = ConnectionState::Transfer;
                        return Ok(FinOutcome::Rewind(seq));
                    }
                    other => log::debug!("[hs] ignoring {other:?} in {}", self.state),
                }
            }
        }

        log::warn!("[hs] FIN not acknowledged after {TEARDOWN_RETRIES} retries; force-closing");
        self.close();
        Ok(FinOutcome::Closed)
    }

    /// Receiver teardown: acknowledge the FIN carrying `fin_seq`.
    ///
    /// Lingers one baseline timeout afterwards, answering repeats of the FIN
    /// in case the acknowledgement was lost, then releases the channel.
    pub async fn acknowledge_fin(&mut self, fin_seq: u32) -> Result<(), DrtpError> {
        let reply = Packet::fin_ack(fin_seq, self.window);
        self.send(&reply).await?;
        log::debug!("[hs] → FIN-ACK seq={fin_seq}");

        let deadline = Instant::now() + self.timer.baseline();
        let mut repeats = 0;
        while let Some(pkt) = self.recv_until(deadline).await? {
            if pkt.kind() == PacketKind::Fin(fin_seq) && repeats < TEARDOWN_RETRIES {
                repeats += 1;
                self.send(&reply).await?;
                log::debug!("[hs] → FIN-ACK seq={fin_seq} (repeat {repeats})");
            }
        }

        log::info!("[hs] connection closed");
        self.close();
        Ok(())
    }

    /// Release the channel's peer and mark the connection closed.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
        self.pending = None;
        self.channel.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted peer: hands out queued datagrams, then blocks forever.
    #[derive(Default)]
    struct Script {
        inbox: VecDeque<Vec<u8>>,
        sent: Vec<Packet>,
        closed: bool,
    }

    impl Script {
        fn replying(pkts: impl IntoIterator<Item = Packet>) -> Self {
            Self {
                inbox: pkts.into_iter().map(|p| p.encode()).collect(),
                ..Self::default()
            }
        }
    }

    impl Channel for Script {
        async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.sent.push(Packet::decode(bytes).expect("well-formed"));
            Ok(())
        }

        async fn recv(&mut self) -> io::Result<Vec<u8>> {
            match self.inbox.pop_front() {
                Some(bytes) => Ok(bytes),
                None => std::future::pending().await,
            }
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    fn fast() -> TimerConfig {
        TimerConfig {
            baseline: Duration::from_millis(50),
            ..TimerConfig::default()
        }
    }

    #[tokio::test]
    async fn connect_skips_runts_and_completes() {
        let mut ch = Script::replying([]);
        ch.inbox.push_back(vec![1, 2, 3]);
        ch.inbox.push_back(Packet::syn_ack(4).encode());
        let conn = Connection::connect(&mut ch, 4, fast()).await.unwrap();
        assert_eq!(conn.state, ConnectionState::Established);
        assert_eq!(ch.sent, vec![Packet::syn(4), Packet::ack(1, 4)]);
    }

    #[tokio::test]
    async fn connect_times_out_in_syn_sent() {
        let mut ch = Script::default();
        let err = Connection::connect(&mut ch, 4, fast()).await.err().unwrap();
        assert!(matches!(
            err,
            DrtpError::HandshakeTimeout {
                state: ConnectionState::SynSent
            }
        ));
        assert!(ch.closed);
    }

    #[tokio::test]
    async fn accept_takes_window_from_syn() {
        let mut ch = Script::replying([Packet::ack(1, 7), Packet::syn(7), Packet::ack(1, 7)]);
        let conn = Connection::accept(&mut ch, fast()).await.unwrap();
        assert_eq!(conn.window, 7);
        assert_eq!(conn.state, ConnectionState::Established);
        assert_eq!(ch.sent, vec![Packet::syn_ack(7)]);
    }

    #[tokio::test]
    async fn proposal_overtaking_final_ack_still_negotiates() {
        let proposal = Packet::new(0, 0, 0, 7, Method::GoBackN.name().as_bytes().to_vec());
        let mut ch = Script::replying([Packet::syn(7), proposal, Packet::ack(1, 7)]);
        let mut conn = Connection::accept(&mut ch, fast()).await.unwrap();
        assert_eq!(conn.state, ConnectionState::Established);

        crate::negotiate::agree_method(&mut conn, Method::GoBackN).await.unwrap();
        assert_eq!(conn.state, ConnectionState::Transfer);
        assert_eq!(conn.method, Some(Method::GoBackN));
        assert_eq!(ch.sent, vec![Packet::syn_ack(7), Packet::ack(0, 7)]);
    }

    #[tokio::test]
    async fn accept_times_out_in_syn_received() {
        let mut ch = Script::replying([Packet::syn(3)]);
        let err = Connection::accept(&mut ch, fast()).await.err().unwrap();
        assert!(matches!(
            err,
            DrtpError::HandshakeTimeout {
                state: ConnectionState::SynReceived
            }
        ));
    }

    #[tokio::test]
    async fn finish_rewinds_on_dup_ack() {
        let mut ch = Script::replying([Packet::dup_ack(4, 1)]);
        let mut conn = Connection::new(&mut ch, Role::Sender, 1, fast());
        assert_eq!(conn.finish(6).await.unwrap(), FinOutcome::Rewind(4));
        assert_eq!(conn.state, ConnectionState::Transfer);
    }

    #[tokio::test]
    async fn finish_ignores_stale_replies() {
        let mut ch = Script::replying([Packet::dup_ack(6, 1), Packet::fin_ack(6, 1)]);
        let mut conn = Connection::new(&mut ch, Role::Sender, 1, fast());
        assert_eq!(conn.finish(6).await.unwrap(), FinOutcome::Closed);
        assert_eq!(conn.state, ConnectionState::Closed);
    }

    #[tokio::test]
    async fn finish_force_closes_after_retries() {
        let mut ch = Script::default();
        let mut conn = Connection::new(&mut ch, Role::Sender, 1, fast());
        conn.timer.record_rtt_sample(Duration::from_millis(1));
        assert_eq!(conn.finish(2).await.unwrap(), FinOutcome::Closed);
        let fins = ch.sent.iter().filter(|p| p.kind() == PacketKind::Fin(2)).count();
        assert_eq!(fins, TEARDOWN_RETRIES as usize + 1);
        assert!(ch.closed);
    }

    #[tokio::test]
    async fn lingering_receiver_reacks_repeated_fin() {
        let mut ch = Script::replying([Packet::fin(3, 1)]);
        let mut conn = Connection::new(&mut ch, Role::Receiver, 1, fast());
        conn.acknowledge_fin(3).await.unwrap();
        assert_eq!(ch.sent, vec![Packet::fin_ack(3, 1), Packet::fin_ack(3, 1)]);
        assert!(ch.closed);
    }
}
