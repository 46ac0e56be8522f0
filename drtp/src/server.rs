//! Receiving peer: accept, agree on the method, reassemble, write the file.
//!
//! The server handles one client at a time.  A failed or rejected attempt is
//! logged and the server goes back to listening; only local I/O errors end
//! [`serve`].

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::DrtpError;
use crate::file;
use crate::negotiate::agree_method;
use crate::simulator::Simulator;
use crate::socket::{Channel, Socket};
use crate::stats::TransferStats;
use crate::transfer;

/// Everything one completed transfer delivered.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// File chunks in sequence order.
    pub chunks: Vec<Vec<u8>>,
    pub stats: TransferStats,
}

impl Delivery {
    /// Total payload size.
    pub fn bytes(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }
}

/// Serve exactly one transfer on `channel`.
///
/// On any failure the channel is closed, so the next call listens afresh.
pub async fn accept_transfer<C: Channel>(
    channel: &mut C,
    config: &ServerConfig,
) -> Result<Delivery, DrtpError> {
    let result = exchange(channel, config).await;
    if result.is_err() {
        channel.close();
    }
    result
}

async fn exchange<C: Channel>(channel: &mut C, config: &ServerConfig) -> Result<Delivery, DrtpError> {
    let mut conn = Connection::accept(channel, config.timer).await?;
    agree_method(&mut conn, config.method).await?;
    let (chunks, stats) = transfer::receive_chunks(&mut conn).await?;
    Ok(Delivery { chunks, stats })
}

/// Accept transfers forever, writing each one to `config.output`.
pub async fn serve<C: Channel>(channel: &mut C, config: &ServerConfig) -> Result<(), DrtpError> {
    loop {
        match accept_transfer(channel, config).await {
            Ok(delivery) => {
                file::write_chunks(&config.output, &delivery.chunks).await?;
                log::info!(
                    "wrote {} bytes to {}",
                    delivery.bytes(),
                    config.output.display()
                );
            }
            Err(DrtpError::Io(e)) => return Err(DrtpError::Io(e)),
            Err(e) => log::warn!("transfer abandoned: {e}; listening again"),
        }
    }
}

/// Bind the configured address and [`serve`] on it.
pub async fn run(config: &ServerConfig) -> Result<(), DrtpError> {
    let mut socket = Socket::bind(config.bind).await?;
    log::info!(
        "listening on {} ({}), output {}",
        socket.local_addr,
        config.method,
        config.output.display()
    );

    if config.faults.is_noop() {
        return serve(&mut socket, config).await;
    }
    let mut sim = Simulator::new(socket, config.faults.clone());
    serve(&mut sim, config).await
}
