//! Fault-injecting channel for tests and the `--test-case` scenarios.
//!
//! Real networks drop and duplicate packets, but loopback almost never does.
//! [`Simulator`] wraps any [`Channel`] and applies a deterministic fault model
//! to outgoing datagrams:
//!
//! | Fault             | Description                                              |
//! |-------------------|----------------------------------------------------------|
//! | Targeted loss     | Drop the first transmission of chosen data sequences.    |
//! | Periodic loss     | Drop every n-th data packet, each sequence at most once. |
//! | ACK loss          | Drop the n-th positive acknowledgement.                  |
//! | Duplication       | Deliver chosen data packets twice, once.                 |
//! | Random loss       | Drop data packets with probability `loss_rate` (seeded). |
//!
//! Only data-phase packets are affected; handshake, negotiation and teardown
//! traffic always passes through.  A receiving simulator cannot tell a
//! negotiation ACK from a data ACK by its header, so ACK faults are armed only
//! once inbound data has been seen.

use std::collections::BTreeSet;
use std::io;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::packet::{Packet, PacketKind};
use crate::socket::Channel;
use crate::state::Role;

/// Sequence dropped by the `skip-seq` test case.
pub const SKIPPED_SEQ: u32 = 3;

/// Which positive ACK the `skip-ack` test case drops.
pub const SKIPPED_ACK: usize = 3;

/// Canned fault scenarios selectable from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TestCase {
    /// No faults.
    #[default]
    #[value(alias = "1")]
    Normal,
    /// The client drops the first transmission of data sequence 3.
    #[value(alias = "2")]
    SkipSeq,
    /// The server drops its third data-phase positive ACK.
    #[value(alias = "3")]
    SkipAck,
}

/// Configuration for the fault-injection model.
///
/// The default is a transparent pass-through.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Faults {
    /// Data sequences whose first transmission is dropped.
    pub drop_seqs: BTreeSet<u32>,
    /// Drop every n-th outgoing data packet (each sequence at most once).
    pub drop_every_nth: Option<usize>,
    /// Drop the n-th outgoing positive ACK (1-based).
    pub drop_nth_ack: Option<usize>,
    /// Data sequences sent twice the first time they go out.
    pub duplicate_seqs: BTreeSet<u32>,
    /// Probability that any given data packet is silently dropped.
    pub loss_rate: f64,
    /// Seed for `loss_rate`, so failures are reproducible.
    pub seed: u64,
}

impl Faults {
    pub fn drop_seqs(seqs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            drop_seqs: seqs.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }

    /// Faults that `case` asks of the peer playing `role`.
    pub fn for_test_case(case: TestCase, role: Role) -> Self {
        match (case, role) {
            (TestCase::SkipSeq, Role::Sender) => Self::drop_seqs([SKIPPED_SEQ]),
            (TestCase::SkipAck, Role::Receiver) => Self {
                drop_nth_ack: Some(SKIPPED_ACK),
                ..Self::default()
            },
            _ => Self::default(),
        }
    }
}

/// Counters describing what the simulator did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultLog {
    /// Data sequences dropped, in order.
    pub dropped_data: Vec<u32>,
    /// Positive ACKs dropped (by sequence field).
    pub dropped_acks: Vec<u32>,
    /// Data sequences duplicated.
    pub duplicated: Vec<u32>,
}

/// A fault-injecting wrapper around another channel.
pub struct Simulator<C> {
    inner: C,
    faults: Faults,
    rng: StdRng,
    data_sent: usize,
    acks_sent: usize,
    /// Inbound data has been seen since the last `close`.
    data_phase: bool,
    /// Sequences already hit by a one-shot fault.
    spent: BTreeSet<u32>,
    log: FaultLog,
}

impl<C: Channel> Simulator<C> {
    pub fn new(inner: C, faults: Faults) -> Self {
        let rng = StdRng::seed_from_u64(faults.seed);
        Self {
            inner,
            faults,
            rng,
            data_sent: 0,
            acks_sent: 0,
            data_phase: false,
            spent: BTreeSet::new(),
            log: FaultLog::default(),
        }
    }

    /// What has been dropped or duplicated so far.
    pub fn fault_log(&self) -> &FaultLog {
        &self.log
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Decide what to do with one outgoing datagram.
    fn verdict(&mut self, bytes: &[u8]) -> Verdict {
        let Ok(pkt) = Packet::decode(bytes) else {
            return Verdict::Pass;
        };
        match pkt.kind() {
            PacketKind::Data(seq) if seq >= 1 && !pkt.payload.is_empty() => self.data_verdict(seq),
            PacketKind::Ack(seq) if self.data_phase => {
                self.acks_sent += 1;
                if self.faults.drop_nth_ack == Some(self.acks_sent) {
                    self.log.dropped_acks.push(seq);
                    Verdict::Drop
                } else {
                    Verdict::Pass
                }
            }
            _ => Verdict::Pass,
        }
    }

    fn data_verdict(&mut self, seq: u32) -> Verdict {
        self.data_sent += 1;
        let first_hit = !self.spent.contains(&seq);

        let targeted = first_hit && self.faults.drop_seqs.contains(&seq);
        let periodic = first_hit
            && self
                .faults
                .drop_every_nth
                .is_some_and(|n| n > 0 && self.data_sent % n == 0);
        if targeted || periodic {
            self.spent.insert(seq);
            self.log.dropped_data.push(seq);
            return Verdict::Drop;
        }

        if self.faults.loss_rate > 0.0 && self.rng.random_bool(self.faults.loss_rate.min(1.0)) {
            self.log.dropped_data.push(seq);
            return Verdict::Drop;
        }

        if first_hit && self.faults.duplicate_seqs.contains(&seq) {
            self.spent.insert(seq);
            self.log.duplicated.push(seq);
            return Verdict::Duplicate;
        }
        Verdict::Pass
    }
}

enum Verdict {
    Pass,
    Drop,
    Duplicate,
}

impl<C: Channel> Channel for Simulator<C> {
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self.verdict(bytes) {
            Verdict::Pass => self.inner.send(bytes).await,
            Verdict::Drop => {
                log::debug!("[sim] dropping {} bytes", bytes.len());
                Ok(())
            }
            Verdict::Duplicate => {
                log::debug!("[sim] duplicating {} bytes", bytes.len());
                self.inner.send(bytes).await?;
                self.inner.send(bytes).await
            }
        }
    }

    async fn recv(&mut self) -> io::Result<Vec<u8>> {
        let bytes = self.inner.recv().await?;
        if let Ok(pkt) = Packet::decode(&bytes) {
            match pkt.kind() {
                PacketKind::Data(seq) if seq >= 1 && !pkt.payload.is_empty() => {
                    self.data_phase = true
                }
                PacketKind::Fin(_) => self.data_phase = false,
                _ => {}
            }
        }
        Ok(bytes)
    }

    fn close(&mut self) {
        self.data_phase = false;
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Records every datagram that reaches it.
    #[derive(Default)]
    struct Tap {
        sent: Vec<Vec<u8>>,
        inbox: VecDeque<Vec<u8>>,
    }

    impl Channel for Tap {
        async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.sent.push(bytes.to_vec());
            Ok(())
        }

        async fn recv(&mut self) -> io::Result<Vec<u8>> {
            self.inbox
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::WouldBlock, "empty"))
        }

        fn close(&mut self) {}
    }

    fn data(seq: u32) -> Vec<u8> {
        Packet::data(seq, 4, vec![seq as u8]).encode()
    }

    fn sent_seqs(sim: &Simulator<Tap>) -> Vec<u32> {
        sim.inner()
            .sent
            .iter()
            .map(|b| Packet::decode(b).unwrap().header.seq)
            .collect()
    }

    #[tokio::test]
    async fn default_is_pass_through() {
        let mut sim = Simulator::new(Tap::default(), Faults::default());
        for seq in 1..=5 {
            sim.send(&data(seq)).await.unwrap();
        }
        assert_eq!(sent_seqs(&sim), vec![1, 2, 3, 4, 5]);
        assert_eq!(sim.fault_log(), &FaultLog::default());
    }

    #[tokio::test]
    async fn targeted_drop_happens_once() {
        let mut sim = Simulator::new(Tap::default(), Faults::drop_seqs([3]));
        for seq in [1, 2, 3, 4, 3] {
            sim.send(&data(seq)).await.unwrap();
        }
        assert_eq!(sent_seqs(&sim), vec![1, 2, 4, 3]);
        assert_eq!(sim.fault_log().dropped_data, vec![3]);
    }

    #[tokio::test]
    async fn every_second_data_packet_dropped_once_per_seq() {
        let faults = Faults {
            drop_every_nth: Some(2),
            ..Faults::default()
        };
        let mut sim = Simulator::new(Tap::default(), faults);
        // 1 ok, 2 dropped, 2 again (4th send) is spared because it was hit.
        for seq in [1, 2, 2, 2] {
            sim.send(&data(seq)).await.unwrap();
        }
        assert_eq!(sim.fault_log().dropped_data, vec![2]);
        assert_eq!(sent_seqs(&sim), vec![1, 2, 2]);
    }

    #[tokio::test]
    async fn control_packets_always_pass() {
        let faults = Faults {
            loss_rate: 1.0,
            ..Faults::default()
        };
        let mut sim = Simulator::new(Tap::default(), faults);
        sim.send(&Packet::syn(4).encode()).await.unwrap();
        sim.send(&Packet::fin(9, 4).encode()).await.unwrap();
        sim.send(&Packet::dup_ack(2, 4).encode()).await.unwrap();
        sim.send(&data(1)).await.unwrap();
        assert_eq!(sim.inner().sent.len(), 3);
    }

    #[tokio::test]
    async fn nth_ack_dropped() {
        let faults = Faults {
            drop_nth_ack: Some(2),
            ..Faults::default()
        };
        let mut sim = Simulator::new(Tap::default(), faults);
        // Negotiation reply: not counted.
        sim.send(&Packet::ack(0, 4).encode()).await.unwrap();
        sim.inner.inbox.push_back(data(1));
        sim.recv().await.unwrap();
        for seq in 1..=3 {
            sim.send(&Packet::ack(seq, 4).encode()).await.unwrap();
        }
        assert_eq!(sim.fault_log().dropped_acks, vec![2]);
        assert_eq!(sent_seqs(&sim), vec![0, 1, 3]);
    }

    #[test]
    fn test_cases_target_one_role() {
        assert_eq!(
            Faults::for_test_case(TestCase::SkipSeq, Role::Sender),
            Faults::drop_seqs([SKIPPED_SEQ])
        );
        assert!(Faults::for_test_case(TestCase::SkipSeq, Role::Receiver).is_noop());
        assert_eq!(
            Faults::for_test_case(TestCase::SkipAck, Role::Receiver).drop_nth_ack,
            Some(SKIPPED_ACK)
        );
        assert!(Faults::for_test_case(TestCase::SkipAck, Role::Sender).is_noop());
        assert!(Faults::for_test_case(TestCase::Normal, Role::Sender).is_noop());
    }

    #[tokio::test]
    async fn duplicate_sends_twice_once() {
        let faults = Faults {
            duplicate_seqs: [2].into_iter().collect(),
            ..Faults::default()
        };
        let mut sim = Simulator::new(Tap::default(), faults);
        for seq in [1, 2, 2] {
            sim.send(&data(seq)).await.unwrap();
        }
        assert_eq!(sent_seqs(&sim), vec![1, 2, 2, 2]);
        assert_eq!(sim.fault_log().duplicated, vec![2]);
    }

    #[test]
    fn test_cases_accept_numeric_aliases() {
        use clap::ValueEnum;
        assert_eq!(TestCase::from_str("1", false), Ok(TestCase::Normal));
        assert_eq!(TestCase::from_str("2", false), Ok(TestCase::SkipSeq));
        assert_eq!(TestCase::from_str("skip-ack", false), Ok(TestCase::SkipAck));
        assert!(TestCase::from_str("4", false).is_err());
    }
}
