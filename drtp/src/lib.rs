//! `drtp` — reliable file transfer over unreliable datagrams.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────┐                         ┌────────────────┐
//!  │ client::run  │                         │  server::run   │
//!  └──────┬───────┘                         └───────┬────────┘
//!         │ chunks                                  │ chunks
//!  ┌──────▼───────────────────────┐  ┌──────────────▼──────────────┐
//!  │ transfer::send_chunks        │  │ transfer::receive_chunks    │
//!  │   ReliableSender (SAW/GBN/SR)│  │   ReliableReceiver          │
//!  └──────┬───────────────────────┘  └──────────────┬──────────────┘
//!         │            negotiate (method name)      │
//!  ┌──────▼─────────────────────────────────────────▼──────────────┐
//!  │       Connection: handshake, teardown, framing, RTO timer     │
//!  └──────┬─────────────────────────────────────────┬──────────────┘
//!         │ datagrams                               │
//!  ┌──────▼──────┐  ┌────────────┐          ┌───────▼─────┐
//!  │  Simulator  │─▶│   Socket   │◀── UDP ─▶│   Socket    │
//!  └─────────────┘  └────────────┘          └─────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]        — 12-byte header codec and packet classification
//! - [`timer`]         — adaptive retransmission timeout
//! - [`state`]         — finite-state-machine types
//! - [`connection`]    — three-way handshake, two-way teardown, framed receive
//! - [`negotiate`]     — reliability-method agreement
//! - [`strategy`]      — the `ReliableSender` / `ReliableReceiver` capability
//! - [`sender`]        — stop-and-wait outbound state
//! - [`receiver`]      — stop-and-wait inbound state
//! - [`gbn_sender`]    — Go-Back-N outbound window state machine
//! - [`gbn_receiver`]  — Go-Back-N inbound in-order state machine
//! - [`sr_sender`]     — selective-repeat outbound window state machine
//! - [`sr_receiver`]   — selective-repeat inbound reordering buffer
//! - [`transfer`]      — data-phase I/O loops
//! - [`stats`]         — packet counts and throughput
//! - [`socket`]        — `Channel` trait and async UDP socket
//! - [`simulator`]     — fault-injecting channel for testing
//! - [`file`]          — chunking and reassembly on disk
//! - [`client`] / [`server`] — the two peers end to end

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod file;
pub mod gbn_receiver;
pub mod gbn_sender;
pub mod negotiate;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod server;
pub mod simulator;
pub mod socket;
pub mod sr_receiver;
pub mod sr_sender;
pub mod state;
pub mod stats;
pub mod strategy;
pub mod timer;
pub mod transfer;

pub use config::{ClientConfig, Method, ServerConfig};
pub use error::DrtpError;
pub use packet::Packet;
pub use stats::TransferStats;
