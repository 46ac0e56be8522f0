//! Connection finite-state machine (FSM) types.
//!
//! Transitions are driven by [`crate::connection`] (handshake and teardown)
//! and [`crate::transfer`] (data phase); this module only names the states.

/// All possible states of the connection FSM.
///
/// ```text
///  client:  CLOSED ──SYN──▶ SYN_SENT ──SYN|ACK──▶ ESTABLISHED ──method ok──▶ TRANSFER
///                                                                              │
///           CLOSED ◀──────────── FIN ack / retries exhausted ──── FIN_SENT ◀───┘
///
///  server:  LISTEN ──SYN──▶ SYN_RCVD ──ACK──▶ ESTABLISHED ──method ok──▶ TRANSFER
///             ▲                                                            │
///             └──────────── timeout / mismatch / FIN acknowledged ─────────┘
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection exists; initial client state.
    #[default]
    Closed,
    /// Server waiting for a SYN.
    Listen,
    /// SYN has been sent; waiting for SYN|ACK.
    SynSent,
    /// SYN received; SYN|ACK sent; waiting for ACK.
    SynReceived,
    /// Three-way handshake complete; method negotiation pending.
    Established,
    /// Strategy agreed; data packets flowing.
    Transfer,
    /// Client sent FIN; waiting for its acknowledgement.
    FinSent,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Closed => "CLOSED",
            Self::Listen => "LISTEN",
            Self::SynSent => "SYN_SENT",
            Self::SynReceived => "SYN_RCVD",
            Self::Established => "ESTABLISHED",
            Self::Transfer => "TRANSFER",
            Self::FinSent => "FIN_SENT",
        };
        f.write_str(name)
    }
}

/// Which side of the transfer a connection plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Client; sends the file.
    Sender,
    /// Server; receives the file.
    Receiver,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sender => f.write_str("sender"),
            Self::Receiver => f.write_str("receiver"),
        }
    }
}
