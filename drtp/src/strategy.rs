//! The reliability capability shared by all three ARQ strategies.
//!
//! Each strategy has a send half ([`ReliableSender`]) and a receive half
//! ([`ReliableReceiver`]).  Both halves are pure state machines: they decide
//! which sequences to (re)transmit and how to answer each arrival, while
//! [`crate::transfer`] owns the socket loop.  The concrete halves are chosen
//! once, from the negotiated [`Method`].

use std::time::{Duration, Instant};

use crate::config::Method;
use crate::gbn_receiver::GbnReceiver;
use crate::gbn_sender::GbnSender;
use crate::packet::Packet;
use crate::receiver::SawReceiver;
use crate::sender::SawSender;
use crate::sr_receiver::SrReceiver;
use crate::sr_sender::SrSender;

/// One data packet the sender wants on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transmit {
    pub seq: u32,
    /// `true` when this sequence has been sent before.
    pub retransmit: bool,
}

/// What a reply did to the send window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AckOutcome {
    /// The oldest unacknowledged sequence moved forward.
    pub advanced: bool,
    /// Round-trip sample, only for packets acknowledged on first transmission.
    pub rtt: Option<Duration>,
}

/// Send half of an ARQ strategy.
///
/// Sequences run from 1 to `total`; the caller maps them to file chunks.
pub trait ReliableSender: Send {
    /// Sequences to transmit now, in order.  Marks them as sent at `now`.
    fn poll_transmit(&mut self, now: Instant) -> Vec<Transmit>;

    /// A positive acknowledgement naming `seq` arrived.
    fn on_ack(&mut self, seq: u32, now: Instant) -> AckOutcome;

    /// The receiver reports it still needs `seq`.
    fn on_dup_ack(&mut self, seq: u32) -> AckOutcome;

    /// No reply arrived within the retransmission timeout.
    fn on_timeout(&mut self);

    /// Resume from `seq` after the receiver rejected the FIN.
    fn rewind(&mut self, seq: u32);

    /// Oldest unacknowledged sequence; retries are counted against it.
    fn base(&self) -> u32;

    /// Every sequence has been acknowledged.
    fn is_complete(&self) -> bool;
}

/// How a receiver answers one arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Positive acknowledgement naming the sequence.
    Ack(u32),
    /// "I still need this sequence."
    DupAck(u32),
}

impl Reply {
    pub fn to_packet(self, window: u16) -> Packet {
        match self {
            Reply::Ack(seq) => Packet::ack(seq, window),
            Reply::DupAck(seq) => Packet::dup_ack(seq, window),
        }
    }
}

/// Receive half of an ARQ strategy.
pub trait ReliableReceiver: Send {
    /// A data packet arrived; returns the reply to send.
    fn on_data(&mut self, seq: u32, payload: Vec<u8>) -> Reply;

    /// Cumulative boundary: the lowest sequence not yet received in order.
    fn boundary(&self) -> u32;

    /// Nothing arrived within the receive timeout; ask for the boundary.
    fn on_timeout(&self) -> Reply {
        Reply::DupAck(self.boundary())
    }

    /// Finish the transfer and return the chunks in sequence order.
    fn into_chunks(self: Box<Self>) -> Vec<Vec<u8>>;
}

/// Send half for `method`, covering sequences `1..=total`.
pub fn sender_for(method: Method, total: u32, window: u16) -> Box<dyn ReliableSender> {
    let window = u32::from(window.max(1));
    match method {
        Method::StopAndWait => Box::new(SawSender::new(total)),
        Method::GoBackN => Box::new(GbnSender::new(total, window)),
        Method::SelectiveRepeat => Box::new(SrSender::new(total, window)),
    }
}

/// Receive half for `method`; `window` bounds the selective-repeat buffer.
pub fn receiver_for(method: Method, window: u16) -> Box<dyn ReliableReceiver> {
    match method {
        Method::StopAndWait => Box::new(SawReceiver::new()),
        Method::GoBackN => Box::new(GbnReceiver::new()),
        Method::SelectiveRepeat => Box::new(SrReceiver::new(u32::from(window.max(1)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drive a sender against a receiver over a perfect, instantaneous link.
    fn lossless(method: Method, total: u32, window: u16) -> Vec<Vec<u8>> {
        let mut tx = sender_for(method, total, window);
        let mut rx = receiver_for(method, window);
        let now = Instant::now();
        while !tx.is_complete() {
            let batch = tx.poll_transmit(now);
            assert!(!batch.is_empty(), "{method} stalled at {}", tx.base());
            for t in batch {
                assert!(!t.retransmit);
                match rx.on_data(t.seq, vec![t.seq as u8]) {
                    Reply::Ack(s) => tx.on_ack(s, now),
                    Reply::DupAck(s) => tx.on_dup_ack(s),
                };
            }
        }
        assert_eq!(rx.boundary(), total + 1);
        rx.into_chunks()
    }

    #[test]
    fn every_method_delivers_in_order_without_loss() {
        for method in Method::ALL {
            let chunks = lossless(method, 12, 4);
            let expected: Vec<Vec<u8>> = (1..=12u8).map(|i| vec![i]).collect();
            assert_eq!(chunks, expected, "{method}");
        }
    }

    #[test]
    fn empty_transfer_is_complete_immediately() {
        for method in Method::ALL {
            let mut tx = sender_for(method, 0, 4);
            assert!(tx.is_complete());
            assert!(tx.poll_transmit(Instant::now()).is_empty());
        }
    }

    #[test]
    fn reply_packets() {
        assert_eq!(Reply::Ack(4).to_packet(2), Packet::ack(4, 2));
        assert_eq!(Reply::DupAck(4).to_packet(2), Packet::dup_ack(4, 2));
    }
}
