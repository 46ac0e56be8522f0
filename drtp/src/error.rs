//! Error type shared by every fallible DRTP operation.

use thiserror::Error;

use crate::packet::PacketError;
use crate::state::ConnectionState;

#[derive(Debug, Error)]
pub enum DrtpError {
    /// A datagram too short to carry a header.  Receive loops discard these;
    /// the variant surfaces only from direct decoding.
    #[error("framing error: {0}")]
    Framing(#[from] PacketError),

    /// The peer did not answer the handshake in time.
    #[error("handshake timed out in state {state}")]
    HandshakeTimeout { state: ConnectionState },

    /// Both peers completed the handshake but disagree on the strategy.
    #[error("reliability method mismatch: local {local}, remote {remote:?}")]
    MethodMismatch { local: String, remote: String },

    /// A method name that matches none of the supported strategies.
    #[error("unknown reliability method {0:?}")]
    UnknownMethod(String),

    /// Too many consecutive timeouts waiting on the same sequence.
    #[error("gave up on sequence {seq} after {retries} retries")]
    RetryExhausted { seq: u32, retries: u32 },

    /// A packet that cannot occur in the current phase.
    #[error("unexpected {what} in state {state}")]
    Protocol {
        what: &'static str,
        state: ConnectionState,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DrtpError {
    /// `true` for failures caused by the network rather than configuration.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Self::HandshakeTimeout { .. } | Self::RetryExhausted { .. } | Self::Io(_)
        )
    }
}
