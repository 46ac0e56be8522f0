//! Reliability-method agreement, run once right after the handshake.
//!
//! The client sends its method's canonical name as the raw payload of a
//! single packet (`seq = 0`, no flags).  The server compares it with its own
//! after dropping whitespace and case:
//!
//! - equal: reply with an ACK, both sides enter `TRANSFER`;
//! - different: reply with a FIN carrying the server's own method name, then
//!   close.  The client surfaces this as [`DrtpError::MethodMismatch`].

use tokio::time::Instant;

use crate::config::Method;
use crate::connection::Connection;
use crate::error::DrtpError;
use crate::packet::{flags, Packet, PacketKind};
use crate::socket::Channel;
use crate::state::ConnectionState;

/// Client side: propose `method` and wait one baseline timeout for the verdict.
pub async fn propose_method<C: Channel>(
    conn: &mut Connection<'_, C>,
    method: Method,
) -> Result<(), DrtpError> {
    let proposal = Packet::new(0, 0, 0, conn.window, method.name().as_bytes().to_vec());
    conn.send(&proposal).await?;
    log::debug!("[hs] → METHOD {method}");

    let deadline = Instant::now() + conn.timer.baseline();
    loop {
        let Some(pkt) = conn.recv_until(deadline).await? else {
            conn.close();
            return Err(DrtpError::HandshakeTimeout {
                state: ConnectionState::Established,
            });
        };
        match pkt.kind() {
            PacketKind::Ack(0) => break,
            PacketKind::Fin(_) => {
                let remote = String::from_utf8_lossy(&pkt.payload).into_owned();
                log::warn!("[hs] server rejected {method}; it runs {remote:?}");
                conn.close();
                return Err(DrtpError::MethodMismatch {
                    local: method.name().to_string(),
                    remote,
                });
            }
            other => log::debug!("[hs] ignoring {other:?} during negotiation"),
        }
    }

    conn.method = Some(method);
    conn.state = ConnectionState::Transfer;
    log::info!("[{}] method agreed: {method}", method.tag());
    Ok(())
}

/// Server side: wait for the client's proposal and check it against `local`.
pub async fn agree_method<C: Channel>(
    conn: &mut Connection<'_, C>,
    local: Method,
) -> Result<(), DrtpError> {
    let deadline = Instant::now() + conn.timer.baseline();
    let proposal = loop {
        let Some(pkt) = conn.recv_until(deadline).await? else {
            conn.close();
            return Err(DrtpError::HandshakeTimeout {
                state: ConnectionState::Established,
            });
        };
        match pkt.kind() {
            PacketKind::Data(0) => break String::from_utf8_lossy(&pkt.payload).into_owned(),
            other => log::debug!("[hs] ignoring {other:?} during negotiation"),
        }
    };
    log::debug!("[hs] ← METHOD {proposal:?}");

    // Parsing normalizes case and whitespace and accepts the CLI aliases.
    if proposal.parse::<Method>().ok() != Some(local) {
        let reject = Packet::new(0, 0, flags::FIN, conn.window, local.name().as_bytes().to_vec());
        conn.send(&reject).await?;
        log::warn!("[hs] client proposed {proposal:?}, this server runs {local}; rejecting");
        conn.close();
        return Err(DrtpError::MethodMismatch {
            local: local.name().to_string(),
            remote: proposal,
        });
    }

    let accept = Packet::ack(0, conn.window);
    conn.send(&accept).await?;
    conn.method = Some(local);
    conn.state = ConnectionState::Transfer;
    log::info!("[{}] method agreed: {local}", local.tag());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use std::time::Duration;

    use crate::timer::TimerConfig;

    /// Scripted peer that, once the script runs dry, keeps sending stray
    /// DUPACKs every 20 ms.
    struct Chatty {
        script: VecDeque<Packet>,
    }

    impl Channel for Chatty {
        async fn send(&mut self, _bytes: &[u8]) -> io::Result<()> {
            Ok(())
        }

        async fn recv(&mut self) -> io::Result<Vec<u8>> {
            match self.script.pop_front() {
                Some(pkt) => Ok(pkt.encode()),
                None => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(Packet::dup_ack(9, 1).encode())
                }
            }
        }

        fn close(&mut self) {}
    }

    fn timer() -> TimerConfig {
        TimerConfig {
            baseline: Duration::from_millis(100),
            ..TimerConfig::default()
        }
    }

    fn timed_out(result: Result<(), DrtpError>) -> bool {
        matches!(
            result,
            Err(DrtpError::HandshakeTimeout {
                state: ConnectionState::Established
            })
        )
    }

    #[tokio::test]
    async fn server_wait_is_bounded_despite_stray_traffic() {
        let mut ch = Chatty {
            script: [Packet::syn(1), Packet::ack(1, 1)].into(),
        };
        let mut conn = Connection::accept(&mut ch, timer()).await.unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(2),
            agree_method(&mut conn, Method::GoBackN),
        )
        .await
        .expect("negotiation wait kept restarting");
        assert!(timed_out(result));
    }

    #[tokio::test]
    async fn client_wait_is_bounded_despite_stray_traffic() {
        let mut ch = Chatty {
            script: [Packet::syn_ack(1)].into(),
        };
        let mut conn = Connection::connect(&mut ch, 1, timer()).await.unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(2),
            propose_method(&mut conn, Method::GoBackN),
        )
        .await
        .expect("negotiation wait kept restarting");
        assert!(timed_out(result));
    }
}
