//! Selective-repeat receive-side state machine.
//!
//! [`SrReceiver`] keeps a window `[boundary, boundary + window)` and buffers
//! any packet that lands inside it, keyed by sequence:
//!
//! - in-window packet: buffer it, ACK its own sequence, and advance the
//!   boundary over any contiguous run now complete;
//! - already-buffered sequence: re-ACK, never re-buffer;
//! - beyond the window: DUPACK naming the boundary.
//!
//! Receive order and delivery order may differ here; [`into_chunks`] emits
//! the buffer sorted by sequence.
//!
//! [`into_chunks`]: ReliableReceiver::into_chunks

use std::collections::BTreeMap;

use crate::strategy::{ReliableReceiver, Reply};

/// Selective-repeat receive-side state for one transfer.
#[derive(Debug)]
pub struct SrReceiver {
    /// Lowest sequence not yet received.
    pub boundary: u32,
    window: u32,
    /// Every accepted payload, keyed by sequence.
    buffer: BTreeMap<u32, Vec<u8>>,
}

impl SrReceiver {
    pub fn new(window: u32) -> Self {
        Self {
            boundary: 1,
            window: window.max(1),
            buffer: BTreeMap::new(),
        }
    }

    /// Number of sequences held ahead of the boundary.
    pub fn out_of_order(&self) -> usize {
        self.buffer.range(self.boundary..).count()
    }

    fn in_window(&self, seq: u32) -> bool {
        seq >= self.boundary && seq < self.boundary.saturating_add(self.window)
    }
}

impl ReliableReceiver for SrReceiver {
    fn on_data(&mut self, seq: u32, payload: Vec<u8>) -> Reply {
        if self.buffer.contains_key(&seq) {
            return Reply::Ack(seq);
        }
        if !self.in_window(seq) {
            return Reply::DupAck(self.boundary);
        }
        self.buffer.insert(seq, payload);
        while self.buffer.contains_key(&self.boundary) {
            self.boundary += 1;
        }
        Reply::Ack(seq)
    }

    fn boundary(&self) -> u32 {
        self.boundary
    }

    fn into_chunks(self: Box<Self>) -> Vec<Vec<u8>> {
        // BTreeMap iterates in ascending key order: this is the sort by
        // sequence that turns arrival order into file order.
        self.buffer.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_ahead_of_boundary() {
        let mut r = SrReceiver::new(4);
        assert_eq!(r.on_data(1, b"a".to_vec()), Reply::Ack(1));
        assert_eq!(r.on_data(3, b"c".to_vec()), Reply::Ack(3));
        assert_eq!(r.on_data(4, b"d".to_vec()), Reply::Ack(4));
        assert_eq!(r.boundary, 2);
        assert_eq!(r.out_of_order(), 2);

        // The gap fills and the boundary jumps over the buffered run.
        assert_eq!(r.on_data(2, b"b".to_vec()), Reply::Ack(2));
        assert_eq!(r.boundary, 5);
        assert_eq!(r.out_of_order(), 0);
    }

    #[test]
    fn beyond_window_asks_for_boundary() {
        let mut r = SrReceiver::new(2);
        assert_eq!(r.on_data(3, b"c".to_vec()), Reply::DupAck(1));
        assert_eq!(r.out_of_order(), 0);
    }

    #[test]
    fn duplicates_are_reacked_not_rebuffered() {
        let mut r = SrReceiver::new(4);
        r.on_data(2, b"first".to_vec());
        assert_eq!(r.on_data(2, b"second".to_vec()), Reply::Ack(2));
        r.on_data(1, b"x".to_vec());
        // Behind the boundary now, still idempotent.
        assert_eq!(r.on_data(1, b"y".to_vec()), Reply::Ack(1));
        assert_eq!(
            Box::new(r).into_chunks(),
            vec![b"x".to_vec(), b"first".to_vec()]
        );
    }

    #[test]
    fn output_sorted_by_sequence() {
        let mut r = SrReceiver::new(5);
        for seq in [5, 2, 4, 1, 3] {
            r.on_data(seq, vec![seq as u8]);
        }
        assert_eq!(r.boundary(), 6);
        let chunks = Box::new(r).into_chunks();
        assert_eq!(chunks, vec![vec![1], vec![2], vec![3], vec![4], vec![5]]);
    }

    #[test]
    fn timeout_names_missing_sequence() {
        let mut r = SrReceiver::new(4);
        r.on_data(1, b"a".to_vec());
        r.on_data(3, b"c".to_vec());
        assert_eq!(r.on_timeout(), Reply::DupAck(2));
    }
}
