//! Inbound state for Stop-and-Wait.
//!
//! [`SawReceiver`] accepts exactly the sequence it expects next and answers
//! every arrival:
//! - in order: buffer the payload, reply ACK (`seq = 0`), expect the next one;
//! - anything else: reply DUPACK naming the expected sequence, buffer nothing.
//!
//! The receiver does **not** send replies itself; it returns the [`Reply`]
//! that [`crate::transfer`] puts on the wire.

use crate::strategy::{ReliableReceiver, Reply};

/// Stop-and-wait receive-side state for one transfer.
#[derive(Debug)]
pub struct SawReceiver {
    /// Next expected sequence number.
    pub expected: u32,
    /// Payloads accepted so far, in order.
    chunks: Vec<Vec<u8>>,
}

impl Default for SawReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl SawReceiver {
    pub fn new() -> Self {
        Self {
            expected: 1,
            chunks: Vec::new(),
        }
    }
}

impl ReliableReceiver for SawReceiver {
    fn on_data(&mut self, seq: u32, payload: Vec<u8>) -> Reply {
        if seq != self.expected {
            return Reply::DupAck(self.expected);
        }
        self.chunks.push(payload);
        self.expected += 1;
        Reply::Ack(0)
    }

    fn boundary(&self) -> u32 {
        self.expected
    }

    fn into_chunks(self: Box<Self>) -> Vec<Vec<u8>> {
        self.chunks
    }
}
