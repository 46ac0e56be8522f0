//! Sending peer: handshake, method proposal, data phase, teardown.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::DrtpError;
use crate::file;
use crate::negotiate::propose_method;
use crate::simulator::Simulator;
use crate::socket::{Channel, Socket};
use crate::stats::TransferStats;
use crate::transfer;

/// Run one complete transfer of `chunks` over `channel`.
///
/// On any failure the channel is closed before the error is returned.
pub async fn send_chunks<C: Channel>(
    channel: &mut C,
    config: &ClientConfig,
    chunks: &[Vec<u8>],
) -> Result<TransferStats, DrtpError> {
    let result = exchange(channel, config, chunks).await;
    if result.is_err() {
        channel.close();
    }
    result
}

async fn exchange<C: Channel>(
    channel: &mut C,
    config: &ClientConfig,
    chunks: &[Vec<u8>],
) -> Result<TransferStats, DrtpError> {
    let mut conn = Connection::connect(channel, config.effective_window(), config.timer).await?;
    propose_method(&mut conn, config.method).await?;
    transfer::send_chunks(&mut conn, chunks).await
}

/// Read the configured file and send it to the configured server over UDP.
pub async fn run(config: &ClientConfig) -> Result<TransferStats, DrtpError> {
    let chunks = file::read_chunks(&config.file).await?;
    log::info!(
        "sending {} ({} bytes, {} chunks) to {} using {}",
        config.file.display(),
        chunks.iter().map(Vec::len).sum::<usize>(),
        chunks.len(),
        config.server,
        config.method
    );

    let local: SocketAddr = if config.server.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let mut socket = Socket::bind(local).await?;
    socket.connect_to(config.server);

    if config.faults.is_noop() {
        return send_chunks(&mut socket, config, &chunks).await;
    }
    let mut sim = Simulator::new(socket, config.faults.clone());
    let result = send_chunks(&mut sim, config, &chunks).await;
    log::info!("fault injection: {:?}", sim.fault_log());
    result
}
