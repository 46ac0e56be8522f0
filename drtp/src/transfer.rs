//! Data phase: drive an ARQ strategy over an established connection.
//!
//! The strategy halves in [`crate::strategy`] decide *what* goes on the wire;
//! the loops here do the I/O:
//!
//! ```text
//!  sender:   poll_transmit ─▶ send DATA ─▶ wait ≤ RTO ─┬─ ACK / DUPACK ─▶ on_ack / on_dup_ack
//!                ▲                                     └─ timeout ──────▶ on_timeout
//!                └──────────────────────────────────────────────┘
//!
//!  receiver: wait ≤ baseline ─┬─ DATA ─────────────▶ on_data ─▶ send reply
//!                             ├─ FIN at boundary ──▶ acknowledge, done
//!                             └─ timeout ──────────▶ DUPACK(boundary)
//! ```
//!
//! Timeouts are recovered locally by retransmission; only a run of more than
//! `max_retries` timeouts without progress surfaces, as
//! [`DrtpError::RetryExhausted`].

use std::io;
use std::time::Instant;

use crate::config::Method;
use crate::connection::{Connection, FinOutcome};
use crate::error::DrtpError;
use crate::packet::{Packet, PacketKind};
use crate::socket::Channel;
use crate::state::{ConnectionState, Role};
use crate::stats::TransferStats;
use crate::strategy::{receiver_for, sender_for, AckOutcome, ReliableSender};

fn negotiated<C: Channel>(conn: &Connection<'_, C>) -> Result<Method, DrtpError> {
    match (conn.state, conn.method) {
        (ConnectionState::Transfer, Some(method)) => Ok(method),
        (state, _) => Err(DrtpError::Protocol {
            what: "data phase before method agreement",
            state,
        }),
    }
}

/// Send `chunks` as sequences `1..=chunks.len()`, then tear the connection down.
///
/// Returns the sender's statistics once the FIN has been acknowledged (or
/// the connection force-closed after teardown retries ran out).
pub async fn send_chunks<C: Channel>(
    conn: &mut Connection<'_, C>,
    chunks: &[Vec<u8>],
) -> Result<TransferStats, DrtpError> {
    let method = negotiated(conn)?;
    let total = u32::try_from(chunks.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many chunks"))?;
    let window = if method.is_windowed() { conn.window } else { 1 };

    let mut sender = sender_for(method, total, window);
    let mut stats = TransferStats::new(Role::Sender, method);
    log::info!("[{}] sending {total} chunk(s), window {window}", method.tag());

    loop {
        run_sender(conn, sender.as_mut(), chunks, &mut stats).await?;
        stats.finish(Instant::now());
        match conn.finish(total + 1).await? {
            FinOutcome::Closed => break,
            FinOutcome::Rewind(seq) => {
                log::info!("[{}] receiver still needs seq={seq}; resuming", method.tag());
                sender.rewind(seq);
            }
        }
    }

    log::info!("{stats}");
    Ok(stats)
}

/// Run `sender` until every sequence is acknowledged.
async fn run_sender<C: Channel>(
    conn: &mut Connection<'_, C>,
    sender: &mut dyn ReliableSender,
    chunks: &[Vec<u8>],
    stats: &mut TransferStats,
) -> Result<(), DrtpError> {
    let tag = stats.method.tag();
    let max_retries = conn.timer.config.max_retries;
    let mut retries = 0u32;
    let mut deadline = tokio::time::Instant::now() + conn.timer.rto();

    while !sender.is_complete() {
        let batch = sender.poll_transmit(Instant::now());
        if !batch.is_empty() {
            stats.start(Instant::now());
            for t in batch {
                let payload = chunks[(t.seq - 1) as usize].clone();
                let len = payload.len();
                let pkt = Packet::data(t.seq, conn.window, payload);
                conn.send(&pkt).await?;
                stats.record_packet(len);
                if t.retransmit {
                    stats.record_retransmit(t.seq);
                    log::debug!("[{tag}] → DATA seq={} len={len} (retransmit)", t.seq);
                } else {
                    log::debug!("[{tag}] → DATA seq={} len={len}", t.seq);
                }
            }
            deadline = tokio::time::Instant::now() + conn.timer.rto();
        }

        let Some(pkt) = conn.recv_until(deadline).await? else {
            retries += 1;
            if retries > max_retries {
                let seq = sender.base();
                log::warn!("[{tag}] no progress on seq={seq} after {max_retries} retries");
                conn.close();
                return Err(DrtpError::RetryExhausted {
                    seq,
                    retries: max_retries,
                });
            }
            log::debug!(
                "[{tag}] timeout waiting on seq={} (retry {retries}, rto {:?})",
                sender.base(),
                conn.timer.rto()
            );
            sender.on_timeout();
            deadline = tokio::time::Instant::now() + conn.timer.rto();
            continue;
        };

        let outcome = match pkt.kind() {
            PacketKind::Ack(seq) => {
                log::debug!("[{tag}] ← ACK seq={seq}");
                sender.on_ack(seq, Instant::now())
            }
            PacketKind::DupAck(seq) => {
                log::debug!("[{tag}] ← DUPACK seq={seq}");
                sender.on_dup_ack(seq)
            }
            other => {
                log::debug!("[{tag}] ignoring {other:?} during transfer");
                AckOutcome::default()
            }
        };
        if let Some(rtt) = outcome.rtt {
            conn.timer.record_rtt_sample(rtt);
        }
        if outcome.advanced {
            retries = 0;
            deadline = tokio::time::Instant::now() + conn.timer.rto();
        }
    }
    Ok(())
}

/// Receive data until the sender's FIN lines up with the cumulative boundary.
///
/// Returns the chunks in sequence order together with the receiver's
/// statistics.  The FIN is acknowledged and the channel released before
/// returning.
pub async fn receive_chunks<C: Channel>(
    conn: &mut Connection<'_, C>,
) -> Result<(Vec<Vec<u8>>, TransferStats), DrtpError> {
    let method = negotiated(conn)?;
    let tag = method.tag();
    let window = conn.window;
    let mut receiver = receiver_for(method, window);
    let mut stats = TransferStats::new(Role::Receiver, method);
    let wait = conn.timer.baseline();
    let max_idle = conn.timer.config.max_retries;
    let mut idle = 0u32;

    loop {
        let Some(pkt) = conn.recv_within(wait).await? else {
            idle += 1;
            if idle > max_idle {
                let seq = receiver.boundary();
                log::warn!("[{tag}] sender silent while waiting on seq={seq}");
                conn.close();
                return Err(DrtpError::RetryExhausted {
                    seq,
                    retries: max_idle,
                });
            }
            let reply = receiver.on_timeout();
            log::debug!("[{tag}] receive timeout; → {reply:?}");
            conn.send(&reply.to_packet(window)).await?;
            continue;
        };
        idle = 0;

        match pkt.kind() {
            PacketKind::Data(seq) if seq >= 1 => {
                stats.start(Instant::now());
                let len = pkt.payload.len();
                stats.record_packet(len);
                let reply = receiver.on_data(seq, pkt.payload);
                log::debug!("[{tag}] ← DATA seq={seq} len={len}; → {reply:?}");
                conn.send(&reply.to_packet(window)).await?;
            }
            PacketKind::Fin(seq) if seq == receiver.boundary() => {
                stats.finish(Instant::now());
                log::debug!("[{tag}] ← FIN seq={seq}");
                conn.acknowledge_fin(seq).await?;
                break;
            }
            PacketKind::Fin(seq) => {
                let boundary = receiver.boundary();
                log::debug!("[{tag}] ← FIN seq={seq} but still need seq={boundary}");
                conn.send(&Packet::dup_ack(boundary, window)).await?;
            }
            other => log::debug!("[{tag}] ignoring {other:?} during transfer"),
        }
    }

    log::info!("{stats}");
    Ok((receiver.into_chunks(), stats))
}
