//! Retransmission timeout estimation.
//!
//! Reliable delivery requires that unacknowledged packets are re-sent if no
//! acknowledgement arrives within a bounded time.  [`RetransmitTimer`] derives
//! that bound from observed round trips:
//!
//! ```text
//!   RTO = 4 × (most recent RTT sample)
//! ```
//!
//! clamped to `[min_rto, max_rto]`.  Before the first sample the baseline
//! timeout is used.  Only first transmissions are sampled (Karn's rule); the
//! caller enforces that by never reporting a sample for a retransmitted packet.

use std::time::Duration;

/// Multiplier applied to each round-trip sample.
const RTT_FACTOR: u32 = 4;

/// Adjustable timeout parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// Timeout before any RTT sample is available; also the fixed handshake
    /// and receiver-side timeout.
    pub baseline: Duration,
    /// Lower bound on the adaptive RTO.
    pub min_rto: Duration,
    /// Upper bound on the adaptive RTO.
    pub max_rto: Duration,
    /// Consecutive timeouts tolerated for the same sequence before giving up.
    pub max_retries: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            baseline: Duration::from_millis(500),
            min_rto: Duration::from_millis(50),
            max_rto: Duration::from_secs(2),
            max_retries: 10,
        }
    }
}

/// Adaptive retransmit timeout for one connection.
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    pub config: TimerConfig,
    /// Current RTO, updated after each RTT sample.
    current_rto: Duration,
    /// Most recent round-trip sample.
    last_sample: Option<Duration>,
}

impl Default for RetransmitTimer {
    fn default() -> Self {
        Self::new(TimerConfig::default())
    }
}

impl RetransmitTimer {
    pub fn new(config: TimerConfig) -> Self {
        Self {
            config,
            current_rto: config.baseline,
            last_sample: None,
        }
    }

    /// Record a new RTT sample and set the RTO to `4 × sample`.
    pub fn record_rtt_sample(&mut self, sample: Duration) {
        self.last_sample = Some(sample);
        self.current_rto = (sample * RTT_FACTOR).clamp(self.config.min_rto, self.config.max_rto);
    }

    /// Deadline to wait for the next acknowledgement.
    pub fn rto(&self) -> Duration {
        self.current_rto
    }

    /// Most recent round-trip sample, if any has been taken.
    pub fn last_sample(&self) -> Option<Duration> {
        self.last_sample
    }

    /// Fixed timeout used outside the data phase.
    pub fn baseline(&self) -> Duration {
        self.config.baseline
    }
}
