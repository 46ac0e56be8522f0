//! Outbound state for Stop-and-Wait.
//!
//! [`SawSender`] tracks the single in-flight sequence.  It does **not** touch
//! the socket; [`crate::transfer`] calls these methods and owns the actual
//! send/receive loop.
//!
//! # Stop-and-Wait contract
//! - At most **one** packet is in flight at any moment.
//! - On ACK (`seq == 0`): advance `seq_num`.
//! - On DUPACK `k`: resume sending from `k`.
//! - On timeout: resend the same packet unchanged.

use std::time::Instant;

use crate::strategy::{AckOutcome, ReliableSender, Transmit};

/// The packet currently awaiting acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    /// Wall-clock time of the most recent transmission (for RTT sampling).
    pub sent_at: Instant,
    /// Whether this is a retransmission (no RTT sample is taken then).
    pub retransmit: bool,
}

/// Stop-and-wait send-side state for one transfer.
#[derive(Debug)]
pub struct SawSender {
    /// Sequence number of the packet being sent; `total + 1` once done.
    pub seq_num: u32,
    total: u32,
    /// Highest sequence ever put on the wire.
    highest_sent: u32,
    /// The in-flight packet, or `None` when the next poll should (re)send.
    pub in_flight: Option<InFlight>,
}

impl SawSender {
    pub fn new(total: u32) -> Self {
        Self {
            seq_num: 1,
            total,
            highest_sent: 0,
            in_flight: None,
        }
    }
}

impl ReliableSender for SawSender {
    fn poll_transmit(&mut self, now: Instant) -> Vec<Transmit> {
        if self.is_complete() || self.in_flight.is_some() {
            return Vec::new();
        }
        let retransmit = self.seq_num <= self.highest_sent;
        self.highest_sent = self.highest_sent.max(self.seq_num);
        self.in_flight = Some(InFlight {
            sent_at: now,
            retransmit,
        });
        vec![Transmit {
            seq: self.seq_num,
            retransmit,
        }]
    }

    fn on_ack(&mut self, _seq: u32, now: Instant) -> AckOutcome {
        // The ACK carries no sequence under SAW; it covers the current packet
        // provided that packet has actually been sent.
        if self.is_complete() || self.highest_sent < self.seq_num {
            return AckOutcome::default();
        }
        let rtt = self
            .in_flight
            .take()
            .filter(|f| !f.retransmit)
            .map(|f| now.saturating_duration_since(f.sent_at));
        self.seq_num += 1;
        AckOutcome {
            advanced: true,
            rtt,
        }
    }

    fn on_dup_ack(&mut self, seq: u32) -> AckOutcome {
        // The receiver cannot need anything beyond one past what was sent.
        if seq == 0 || seq > self.highest_sent + 1 {
            return AckOutcome::default();
        }
        let advanced = seq > self.seq_num;
        self.seq_num = seq;
        self.in_flight = None;
        AckOutcome {
            advanced,
            rtt: None,
        }
    }

    fn on_timeout(&mut self) {
        self.in_flight = None;
    }

    fn rewind(&mut self, seq: u32) {
        self.seq_num = seq.max(1);
        self.in_flight = None;
    }

    fn base(&self) -> u32 {
        self.seq_num
    }

    fn is_complete(&self) -> bool {
        self.seq_num > self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn one_packet_in_flight() {
        let mut s = SawSender::new(3);
        let now = Instant::now();
        assert_eq!(
            s.poll_transmit(now),
            vec![Transmit {
                seq: 1,
                retransmit: false
            }]
        );
        // Waiting: nothing more to send until a reply or timeout.
        assert!(s.poll_transmit(now).is_empty());
    }

    #[test]
    fn ack_advances_and_samples_rtt() {
        let mut s = SawSender::new(3);
        let t0 = Instant::now();
        s.poll_transmit(t0);
        let out = s.on_ack(0, t0 + Duration::from_millis(7));
        assert!(out.advanced);
        assert_eq!(out.rtt, Some(Duration::from_millis(7)));
        assert_eq!(s.seq_num, 2);
    }

    #[test]
    fn timeout_resends_same_packet_without_sampling() {
        let mut s = SawSender::new(3);
        let t0 = Instant::now();
        s.poll_transmit(t0);
        s.on_timeout();
        assert_eq!(
            s.poll_transmit(t0),
            vec![Transmit {
                seq: 1,
                retransmit: true
            }]
        );
        let out = s.on_ack(0, t0 + Duration::from_millis(3));
        assert!(out.advanced);
        assert_eq!(out.rtt, None);
    }

    #[test]
    fn dup_ack_resumes_from_named_sequence() {
        let mut s = SawSender::new(5);
        let now = Instant::now();
        s.poll_transmit(now);
        s.on_ack(0, now);
        s.poll_transmit(now); // seq 2 lost
        let out = s.on_dup_ack(2);
        assert!(!out.advanced);
        assert_eq!(s.poll_transmit(now)[0].seq, 2);

        // A DUPACK ahead of us means the receiver already has everything below.
        let out = s.on_dup_ack(3);
        assert!(out.advanced);
        assert_eq!(s.seq_num, 3);
    }

    #[test]
    fn ack_before_any_send_is_ignored() {
        let mut s = SawSender::new(2);
        assert!(!s.on_ack(0, Instant::now()).advanced);
        assert_eq!(s.seq_num, 1);
    }

    #[test]
    fn completes_after_last_ack() {
        let mut s = SawSender::new(2);
        let now = Instant::now();
        for _ in 0..2 {
            s.poll_transmit(now);
            s.on_ack(0, now);
        }
        assert!(s.is_complete());
        assert!(s.poll_transmit(now).is_empty());
        // Late ACKs after completion change nothing.
        assert!(!s.on_ack(0, now).advanced);
    }

    #[test]
    fn bogus_dup_ack_ignored() {
        let mut s = SawSender::new(2);
        assert_eq!(s.on_dup_ack(0), AckOutcome::default());
        assert_eq!(s.on_dup_ack(99), AckOutcome::default());
        assert_eq!(s.seq_num, 1);
    }
}
