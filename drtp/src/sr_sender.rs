//! Selective-repeat send-side state machine.
//!
//! Windowed like [`crate::gbn_sender::GbnSender`], but every packet is
//! acknowledged individually and only the sequences known to be missing are
//! sent again:
//!
//! - an ACK for `s` retires `s` alone; `base` slides over the acknowledged
//!   prefix;
//! - a DUPACK for `k` retires everything below `k` and marks `k` missing;
//! - a timeout marks every still-unacknowledged in-flight sequence missing.
//!
//! Missing sequences are retransmitted before new ones on the next poll.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use crate::strategy::{AckOutcome, ReliableSender, Transmit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SrEntry {
    sent_at: Instant,
    retransmit: bool,
}

/// Selective-repeat send-side state for one transfer.
#[derive(Debug)]
pub struct SrSender {
    /// Oldest unacknowledged sequence.
    pub base: u32,
    /// Next never-sent sequence.
    pub next_seq: u32,
    window: u32,
    total: u32,
    /// Sent but unacknowledged, keyed by sequence.
    in_flight: BTreeMap<u32, SrEntry>,
    /// Subset of `in_flight` to retransmit on the next poll.
    missing: BTreeSet<u32>,
}

impl SrSender {
    pub fn new(total: u32, window: u32) -> Self {
        assert!(window >= 1, "window must be at least 1");
        Self {
            base: 1,
            next_seq: 1,
            window,
            total,
            in_flight: BTreeMap::new(),
            missing: BTreeSet::new(),
        }
    }

    /// Sequences queued for selective retransmission.
    pub fn missing(&self) -> impl Iterator<Item = u32> + '_ {
        self.missing.iter().copied()
    }

    /// Move `base` to the oldest sequence still in flight.
    fn slide(&mut self) -> bool {
        let old = self.base;
        self.base = self
            .in_flight
            .keys()
            .next()
            .copied()
            .unwrap_or(self.next_seq);
        self.base > old
    }
}

impl ReliableSender for SrSender {
    fn poll_transmit(&mut self, now: Instant) -> Vec<Transmit> {
        let mut out = Vec::new();

        for seq in std::mem::take(&mut self.missing) {
            if let Some(entry) = self.in_flight.get_mut(&seq) {
                entry.sent_at = now;
                entry.retransmit = true;
                out.push(Transmit {
                    seq,
                    retransmit: true,
                });
            }
        }

        while self.next_seq < self.base.saturating_add(self.window) && self.next_seq <= self.total {
            let seq = self.next_seq;
            self.in_flight.insert(
                seq,
                SrEntry {
                    sent_at: now,
                    retransmit: false,
                },
            );
            self.next_seq += 1;
            out.push(Transmit {
                seq,
                retransmit: false,
            });
        }
        out
    }

    fn on_ack(&mut self, seq: u32, now: Instant) -> AckOutcome {
        let Some(entry) = self.in_flight.remove(&seq) else {
            return AckOutcome::default();
        };
        self.missing.remove(&seq);
        let rtt = (!entry.retransmit).then(|| now.saturating_duration_since(entry.sent_at));
        AckOutcome {
            advanced: self.slide(),
            rtt,
        }
    }

    fn on_dup_ack(&mut self, seq: u32) -> AckOutcome {
        if seq < self.base || seq > self.next_seq {
            return AckOutcome::default();
        }
        // The receiver holds everything below `seq`.
        self.in_flight = self.in_flight.split_off(&seq);
        self.missing = self.missing.split_off(&seq);
        if self.in_flight.contains_key(&seq) {
            self.missing.insert(seq);
        }
        AckOutcome {
            advanced: self.slide(),
            rtt: None,
        }
    }

    fn on_timeout(&mut self) {
        self.missing.extend(self.in_flight.keys().copied());
    }

    fn rewind(&mut self, seq: u32) {
        self.in_flight.clear();
        self.missing.clear();
        self.next_seq = seq.max(1);
        self.base = self.next_seq;
    }

    fn base(&self) -> u32 {
        self.base
    }

    fn is_complete(&self) -> bool {
        self.base > self.total
    }
}
