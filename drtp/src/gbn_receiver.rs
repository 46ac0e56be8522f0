//! Go-Back-N receive-side state machine.
//!
//! [`GbnReceiver`] implements the receiver side of Go-Back-N:
//!
//! - Only **in-order** packets are accepted (seq == `expected`), and each is
//!   ACKed individually with its own sequence.
//! - Out-of-order or duplicate packets are **discarded** and answered with a
//!   DUPACK naming `expected`, which sends the sender back to that point.
//!
//! This module only manages state; all socket I/O is the caller's
//! responsibility (same pattern as [`crate::receiver::SawReceiver`]).

use crate::strategy::{ReliableReceiver, Reply};

/// Go-Back-N receive-side state for one transfer.
#[derive(Debug)]
pub struct GbnReceiver {
    /// Next expected sequence number (the cumulative boundary).
    ///
    /// Advances by one each time an in-order packet is accepted.
    pub expected: u32,

    /// In-order payloads, in strict arrival order.
    chunks: Vec<Vec<u8>>,
}

impl Default for GbnReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl GbnReceiver {
    pub fn new() -> Self {
        Self {
            expected: 1,
            chunks: Vec::new(),
        }
    }

    /// Bytes accepted so far.
    pub fn buffered_len(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }
}

impl ReliableReceiver for GbnReceiver {
    /// Accept `seq` only if it is the next expected one.
    ///
    /// Out-of-order (seq > `expected`) and duplicate (seq < `expected`)
    /// packets are both dropped without buffering.
    fn on_data(&mut self, seq: u32, payload: Vec<u8>) -> Reply {
        if seq == self.expected {
            self.chunks.push(payload);
            self.expected += 1;
            Reply::Ack(seq)
        } else {
            Reply::DupAck(self.expected)
        }
    }

    fn boundary(&self) -> u32 {
        self.expected
    }

    fn into_chunks(self: Box<Self>) -> Vec<Vec<u8>> {
        self.chunks
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state() {
        let r = GbnReceiver::new();
        assert_eq!(r.expected, 1);
        assert_eq!(r.buffered_len(), 0);
    }

    #[test]
    fn in_order_packet_accepted() {
        let mut r = GbnReceiver::new();
        assert_eq!(r.on_data(1, b"hello".to_vec()), Reply::Ack(1));
        assert_eq!(r.expected, 2);
        assert_eq!(r.buffered_len(), 5);
    }

    #[test]
    fn out_of_order_packet_discarded() {
        let mut r = GbnReceiver::new();
        r.on_data(1, b"a".to_vec());
        // gap: seq 2 missing
        assert_eq!(r.on_data(3, b"future".to_vec()), Reply::DupAck(2));
        assert_eq!(r.expected, 2); // must not advance
        assert_eq!(r.buffered_len(), 1);
    }

    #[test]
    fn duplicate_packet_discarded() {
        let mut r = GbnReceiver::new();
        r.on_data(1, b"hello".to_vec());
        assert_eq!(r.on_data(1, b"hello".to_vec()), Reply::DupAck(2));
        // Buffer should have only the first copy.
        assert_eq!(r.buffered_len(), 5);
    }

    #[test]
    fn gap_filled_after_go_back() {
        let mut r = GbnReceiver::new();
        r.on_data(1, b"a".to_vec());
        r.on_data(3, b"c".to_vec());
        r.on_data(4, b"d".to_vec());
        for (seq, byte) in [(2, b'b'), (3, b'c'), (4, b'd')] {
            assert_eq!(r.on_data(seq, vec![byte]), Reply::Ack(seq));
        }
        assert_eq!(
            Box::new(r).into_chunks(),
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]
        );
    }
}
