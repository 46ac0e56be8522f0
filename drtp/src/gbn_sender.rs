//! Go-Back-N send-side state machine.
//!
//! [`GbnSender`] maintains a sliding window of up to `N` in-flight packets.
//! Unlike stop-and-wait, multiple packets may be outstanding simultaneously.
//!
//! # Protocol contract
//!
//! - At most `window` packets may be in flight at once.
//! - An ACK for `s` acknowledges everything up to `s` (in-order delivery
//!   makes it cumulative), sliding `base` to `s + 1`.
//! - A DUPACK for `k` rewinds `next_seq` to `k`: the whole window from `k`
//!   goes out again.  Further DUPACKs for the same `k` are ignored until the
//!   window moves or a timeout fires, so one loss costs one go-back.
//! - On timeout, the caller retransmits **all** unacked packets from `base`
//!   onwards (go back to N).
//!
//! This module only manages state; all socket I/O is the caller's responsibility.

use std::collections::VecDeque;
use std::time::Instant;

use crate::strategy::{AckOutcome, ReliableSender, Transmit};

/// A single in-flight packet occupying one slot in the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GbnEntry {
    pub seq: u32,
    /// Wall-clock time of the most recent transmission (for RTT sampling).
    pub sent_at: Instant,
    /// `true` if this sequence had been sent before this transmission.
    pub retransmit: bool,
}

/// Go-Back-N send-side state for one transfer.
///
/// # Sequence-number layout
///
/// ```text
///    base            next_seq        base + window
///      │                  │                │
///  ────┼──────────────────┼────────────────┼──────▶ seq space
///      │ <── in flight ──▶│ <── sendable ─▶│
/// ```
#[derive(Debug)]
pub struct GbnSender {
    /// Sequence number of the **oldest** unacked packet (left window edge).
    pub base: u32,

    /// Sequence number to send next.
    pub next_seq: u32,

    /// Maximum number of packets that may be in flight simultaneously (N).
    window: u32,

    /// Last sequence of the transfer.
    total: u32,

    /// In-flight packets ordered by sequence number (front = oldest).
    in_flight: VecDeque<GbnEntry>,

    /// Highest sequence ever put on the wire.
    highest_sent: u32,

    /// Sequence of the go-back already under way, if any.
    rewound_to: Option<u32>,
}

impl GbnSender {
    /// Create a new [`GbnSender`] for sequences `1..=total`.
    ///
    /// `window` is the GBN window size N (≥ 1).
    pub fn new(total: u32, window: u32) -> Self {
        assert!(window >= 1, "window must be at least 1");
        Self {
            base: 1,
            next_seq: 1,
            window,
            total,
            in_flight: VecDeque::with_capacity(window as usize),
            highest_sent: 0,
            rewound_to: None,
        }
    }

    /// `true` when there is room for at least one more in-flight packet.
    pub fn can_send(&self) -> bool {
        self.next_seq < self.base.saturating_add(self.window) && self.next_seq <= self.total
    }

    /// Number of packets currently awaiting acknowledgement.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Go back to `seq`: forget what is in flight from there on.
    fn go_back(&mut self, seq: u32) {
        self.next_seq = seq;
        self.in_flight.retain(|e| e.seq < seq);
    }
}

impl ReliableSender for GbnSender {
    fn poll_transmit(&mut self, now: Instant) -> Vec<Transmit> {
        let mut out = Vec::new();
        while self.can_send() {
            let seq = self.next_seq;
            let retransmit = seq <= self.highest_sent;
            self.in_flight.push_back(GbnEntry {
                seq,
                sent_at: now,
                retransmit,
            });
            self.highest_sent = self.highest_sent.max(seq);
            self.next_seq += 1;
            out.push(Transmit { seq, retransmit });
        }
        out
    }

    fn on_ack(&mut self, seq: u32, now: Instant) -> AckOutcome {
        // Reject ACKs behind the window or for packets not in flight.
        if seq < self.base || seq >= self.next_seq {
            return AckOutcome::default();
        }

        let mut rtt = None;
        while let Some(front) = self.in_flight.front() {
            if front.seq > seq {
                break;
            }
            if front.seq == seq && !front.retransmit {
                rtt = Some(now.saturating_duration_since(front.sent_at));
            }
            self.in_flight.pop_front();
        }
        self.base = seq + 1;
        if self.rewound_to.is_some_and(|k| k <= seq) {
            self.rewound_to = None;
        }
        AckOutcome {
            advanced: true,
            rtt,
        }
    }

    fn on_dup_ack(&mut self, seq: u32) -> AckOutcome {
        // The receiver can only be waiting on something already sent, or on
        // the sequence right after the last one sent.
        if seq < self.base || seq > self.highest_sent + 1 {
            return AckOutcome::default();
        }

        // Everything below `seq` has arrived.
        let advanced = seq > self.base;
        while self.in_flight.front().is_some_and(|e| e.seq < seq) {
            self.in_flight.pop_front();
        }
        self.base = seq;
        self.next_seq = self.next_seq.max(seq);

        if seq < self.next_seq && self.rewound_to != Some(seq) {
            self.rewound_to = Some(seq);
            self.go_back(seq);
        }
        AckOutcome {
            advanced,
            rtt: None,
        }
    }

    fn on_timeout(&mut self) {
        self.rewound_to = None;
        self.go_back(self.base);
    }

    fn rewind(&mut self, seq: u32) {
        self.base = seq.max(1);
        self.rewound_to = None;
        self.go_back(self.base);
    }

    fn base(&self) -> u32 {
        self.base
    }

    fn is_complete(&self) -> bool {
        self.base > self.total
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
