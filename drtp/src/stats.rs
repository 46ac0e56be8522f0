//! Transfer accounting: packet and byte counters, elapsed time, throughput.

use std::fmt;
use std::time::{Duration, Instant};

use crate::config::Method;
use crate::state::Role;

/// Elapsed time never reported below this, so rates stay finite.
pub const MIN_ELAPSED: Duration = Duration::from_millis(1);

/// Counters for one side of one transfer.
///
/// The clock starts at the first data packet and stops at the FIN.
#[derive(Debug, Clone)]
pub struct TransferStats {
    pub role: Role,
    pub method: Method,
    /// Data packets sent (sender) or received (receiver), repeats included.
    pub packets: u64,
    /// Payload bytes counted alongside `packets`.
    pub bytes: u64,
    /// Sequences sent more than once, in the order they went out again.
    pub retransmitted: Vec<u32>,
    started: Option<Instant>,
    finished: Option<Instant>,
}

impl TransferStats {
    pub fn new(role: Role, method: Method) -> Self {
        Self {
            role,
            method,
            packets: 0,
            bytes: 0,
            retransmitted: Vec::new(),
            started: None,
            finished: None,
        }
    }

    /// Start the clock.  Later calls are ignored.
    pub fn start(&mut self, now: Instant) {
        self.started.get_or_insert(now);
    }

    pub fn record_packet(&mut self, len: usize) {
        self.packets += 1;
        self.bytes += len as u64;
    }

    pub fn record_retransmit(&mut self, seq: u32) {
        self.retransmitted.push(seq);
    }

    /// Stop the clock.
    pub fn finish(&mut self, now: Instant) {
        self.finished = Some(now);
    }

    /// Time from first data packet to FIN, floored at [`MIN_ELAPSED`].
    pub fn elapsed(&self) -> Duration {
        let raw = match (self.started, self.finished) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            _ => Duration::ZERO,
        };
        raw.max(MIN_ELAPSED)
    }

    /// Packets per second.
    pub fn throughput_pps(&self) -> f64 {
        self.packets as f64 / self.elapsed().as_secs_f64()
    }

    /// Payload megabits per second.
    pub fn throughput_mbps(&self) -> f64 {
        self.bytes as f64 * 8.0 / self.elapsed().as_secs_f64() / 1e6
    }
}

impl fmt::Display for TransferStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {} packets, {} bytes in {:.3}s ({:.2} pkt/s, {:.2} Mbps)",
            self.method.tag(),
            self.role,
            self.method,
            self.packets,
            self.bytes,
            self.elapsed().as_secs_f64(),
            self.throughput_pps(),
            self.throughput_mbps(),
        )?;
        if !self.retransmitted.is_empty() {
            write!(f, ", retransmitted {:?}", self.retransmitted)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_millisecond_transfer_is_finite() {
        let mut s = TransferStats::new(Role::Receiver, Method::StopAndWait);
        let now = Instant::now();
        s.start(now);
        s.record_packet(1460);
        s.finish(now);
        assert_eq!(s.elapsed(), MIN_ELAPSED);
        assert!(s.throughput_pps().is_finite());
        assert!((s.throughput_pps() - 1000.0).abs() < 1e-6);
        assert!(s.throughput_mbps().is_finite());
    }

    #[test]
    fn never_started_reports_zero() {
        let s = TransferStats::new(Role::Sender, Method::GoBackN);
        assert_eq!(s.throughput_pps(), 0.0);
        assert_eq!(s.throughput_mbps(), 0.0);
    }

    #[test]
    fn start_only_counts_once() {
        let mut s = TransferStats::new(Role::Sender, Method::GoBackN);
        let t0 = Instant::now();
        s.start(t0);
        s.start(t0 + Duration::from_secs(1));
        s.finish(t0 + Duration::from_secs(2));
        assert_eq!(s.elapsed(), Duration::from_secs(2));
    }

    #[test]
    fn throughput_from_counters() {
        let mut s = TransferStats::new(Role::Sender, Method::SelectiveRepeat);
        let t0 = Instant::now();
        s.start(t0);
        for _ in 0..10 {
            s.record_packet(125_000);
        }
        s.finish(t0 + Duration::from_secs(2));
        assert!((s.throughput_pps() - 5.0).abs() < 1e-9);
        // 1.25 MB * 8 / 2 s = 5 Mbps
        assert!((s.throughput_mbps() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn display_lists_retransmissions() {
        let mut s = TransferStats::new(Role::Sender, Method::GoBackN);
        s.record_retransmit(3);
        s.record_retransmit(4);
        let line = s.to_string();
        assert!(line.starts_with("[gbn] "), "{line}");
        assert!(line.ends_with("retransmitted [3, 4]"), "{line}");
    }
}
