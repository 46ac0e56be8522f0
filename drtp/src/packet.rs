//! Wire-format definitions for DRTP packets.
//!
//! Every datagram exchanged between peers is a [`Packet`].  This module is
//! responsible for:
//! - Defining the on-wire binary layout (header fields, flags, payload).
//! - Serialising a [`Packet`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Packet`], rejecting input
//!   too short to carry a header.
//! - Classifying a decoded packet into the protocol role it plays
//!   ([`PacketKind`]).
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      Acknowledgment (0/1)                     |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |             Flags             |          Window Size          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Payload ...                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total header size: [`HEADER_LEN`] = 12 bytes.
//! seq(4) + ack(4) + flags(2) + window(2)
//!
//! There is no length field: the payload is everything after the header, so
//! the datagram boundary is the frame boundary.

/// Bit-flag constants for the `flags` header field (only the low nibble is used).
pub mod flags {
    /// Synchronise (connection request).
    pub const SYN: u16 = 0b1000;
    /// Acknowledgement flag, set on handshake replies and positive ACKs.
    pub const ACK: u16 = 0b0100;
    /// Finish: sender has no more data to send.
    pub const FIN: u16 = 0b0010;
    /// Reserved; carried on the wire but never interpreted.
    pub const RESERVED: u16 = 0b0001;
}

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 12;

/// Largest payload a single packet may carry.
pub const MAX_PAYLOAD: usize = 1460;

/// Largest encoded packet: header plus a full payload.
pub const MAX_PACKET_LEN: usize = HEADER_LEN + MAX_PAYLOAD;

// Byte offsets of each field within the serialised header.
const OFF_SEQ: usize = 0;
const OFF_ACK: usize = 4;
const OFF_FLAGS: usize = 8;
const OFF_WINDOW: usize = 10;

/// Fixed-size protocol header.
///
/// Fields are in host byte order; [`Packet::encode`] converts to big-endian
/// on the wire and [`Packet::decode`] converts back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    /// Sequence number of this packet, or the sequence being acknowledged /
    /// requested in control packets.
    pub seq: u32,
    /// `1` if this packet is an acknowledgement, else `0`.
    pub ack: u32,
    /// Bitmask of [`flags`] constants.
    pub flags: u16,
    /// Advertised window size, in packets.
    pub window: u16,
}

/// The four meaningful flag bits, tested independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagBits {
    pub syn: bool,
    pub ack: bool,
    pub fin: bool,
    pub reserved: bool,
}

/// Split a `flags` field into its individual bits.
///
/// Any combination may be set at once (e.g. SYN+ACK); bits above the low
/// nibble are ignored.
pub fn flag_bits(flags: u16) -> FlagBits {
    FlagBits {
        syn: flags & flags::SYN != 0,
        ack: flags & flags::ACK != 0,
        fin: flags & flags::FIN != 0,
        reserved: flags & flags::RESERVED != 0,
    }
}

/// A complete protocol datagram: header + payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub payload: Vec<u8>,
}

/// The protocol role a decoded packet plays.
///
/// Classification only looks at the header; whether a given kind is expected
/// depends on the connection phase and is decided by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Connection request (`SYN`).
    Syn,
    /// Handshake reply (`SYN|ACK`).
    SynAck,
    /// End of transfer; `seq` is one past the last data sequence.
    Fin(u32),
    /// Acknowledgement of a FIN.
    FinAck(u32),
    /// Positive acknowledgement of the named sequence.
    Ack(u32),
    /// Duplicate acknowledgement: the receiver still needs this sequence.
    DupAck(u32),
    /// Data (or negotiation) packet carrying the given sequence.
    Data(u32),
}

impl Packet {
    /// Build a packet from its raw header fields.
    pub fn new(seq: u32, ack: u32, flags: u16, window: u16, payload: Vec<u8>) -> Self {
        Self {
            header: Header {
                seq,
                ack,
                flags,
                window,
            },
            payload,
        }
    }

    /// Connection request; `window` advertises the client's configured window.
    pub fn syn(window: u16) -> Self {
        Self::new(1, 0, flags::SYN, window, Vec::new())
    }

    /// Handshake reply to a SYN.
    pub fn syn_ack(window: u16) -> Self {
        Self::new(1, 0, flags::SYN | flags::ACK, window, Vec::new())
    }

    /// A data packet carrying one file chunk.
    pub fn data(seq: u32, window: u16, payload: Vec<u8>) -> Self {
        Self::new(seq, 0, 0, window, payload)
    }

    /// Positive acknowledgement naming `seq`.
    pub fn ack(seq: u32, window: u16) -> Self {
        Self::new(seq, 1, flags::ACK, window, Vec::new())
    }

    /// Duplicate acknowledgement: "I still need `seq`".
    pub fn dup_ack(seq: u32, window: u16) -> Self {
        Self::new(seq, 1, 0, window, Vec::new())
    }

    /// End-of-transfer marker; `seq` is one past the last data sequence.
    pub fn fin(seq: u32, window: u16) -> Self {
        Self::new(seq, 0, flags::FIN, window, Vec::new())
    }

    /// Acknowledgement of the FIN carrying `seq`.
    pub fn fin_ack(seq: u32, window: u16) -> Self {
        Self::new(seq, 1, flags::FIN | flags::ACK, window, Vec::new())
    }

    /// Decoded view of this packet's flag bits.
    pub fn flag_bits(&self) -> FlagBits {
        flag_bits(self.header.flags)
    }

    /// Classify this packet by its header fields.
    pub fn kind(&self) -> PacketKind {
        let bits = self.flag_bits();
        let seq = self.header.seq;
        let is_ack = self.header.ack == 1;
        match (bits.syn, bits.fin, bits.ack, is_ack) {
            (true, _, true, _) => PacketKind::SynAck,
            (true, _, false, _) => PacketKind::Syn,
            (false, true, _, true) => PacketKind::FinAck(seq),
            (false, true, _, false) => PacketKind::Fin(seq),
            (false, false, true, _) => PacketKind::Ack(seq),
            (false, false, false, true) => PacketKind::DupAck(seq),
            (false, false, false, false) => PacketKind::Data(seq),
        }
    }

    /// Serialise this packet into a newly allocated byte vector.
    ///
    /// Callers keep payloads within [`MAX_PAYLOAD`]; the encoded length is
    /// always `HEADER_LEN + payload.len()`.
    pub fn encode(&self) -> Vec<u8> {
        debug_assert!(
            self.payload.len() <= MAX_PAYLOAD,
            "payload of {} bytes exceeds {MAX_PAYLOAD}",
            self.payload.len()
        );
        let mut buf = vec![0u8; HEADER_LEN + self.payload.len()];

        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.header.seq.to_be_bytes());
        buf[OFF_ACK..OFF_ACK + 4].copy_from_slice(&self.header.ack.to_be_bytes());
        buf[OFF_FLAGS..OFF_FLAGS + 2].copy_from_slice(&self.header.flags.to_be_bytes());
        buf[OFF_WINDOW..OFF_WINDOW + 2].copy_from_slice(&self.header.window.to_be_bytes());
        buf[HEADER_LEN..].copy_from_slice(&self.payload);

        buf
    }

    /// Parse a [`Packet`] from a raw byte slice.
    ///
    /// Returns [`PacketError::Framing`] if `buf` is shorter than
    /// [`HEADER_LEN`].  Everything after the header is payload.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::Framing { len: buf.len() });
        }

        let seq = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let ack = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let flags = u16::from_be_bytes([buf[OFF_FLAGS], buf[OFF_FLAGS + 1]]);
        let window = u16::from_be_bytes([buf[OFF_WINDOW], buf[OFF_WINDOW + 1]]);

        Ok(Packet::new(seq, ack, flags, window, buf[HEADER_LEN..].to_vec()))
    }
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    /// Datagram shorter than the fixed header size.
    Framing { len: usize },
}

impl std::fmt::Display for PacketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacketError::Framing { len } => {
                write!(f, "{len}-byte datagram is too short to contain a header")
            }
        }
    }
}

impl std::error::Error for PacketError {}
