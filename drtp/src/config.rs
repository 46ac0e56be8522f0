//! Reliability methods and peer configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::DrtpError;
use crate::simulator::Faults;
use crate::timer::TimerConfig;

/// Default client window (packets in flight) for GBN and GBN-SR.
pub const DEFAULT_WINDOW: u16 = 5;

/// The three selectable ARQ strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    StopAndWait,
    GoBackN,
    SelectiveRepeat,
}

impl Method {
    pub const ALL: [Method; 3] = [Self::StopAndWait, Self::GoBackN, Self::SelectiveRepeat];

    /// Canonical name, sent verbatim as the negotiation payload.
    pub fn name(self) -> &'static str {
        match self {
            Self::StopAndWait => "Stop-and-Wait",
            Self::GoBackN => "Go-Back-N",
            Self::SelectiveRepeat => "Go-Back-N-Selective-Repeat",
        }
    }

    /// Short tag used as a log prefix.
    pub fn tag(self) -> &'static str {
        match self {
            Self::StopAndWait => "saw",
            Self::GoBackN => "gbn",
            Self::SelectiveRepeat => "sr",
        }
    }

    /// Whether the configured window applies; SAW always has one packet in flight.
    pub fn is_windowed(self) -> bool {
        !matches!(self, Self::StopAndWait)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Lowercase and drop whitespace, so `" Go-Back-N "` and `"go-back-n"` agree.
pub fn normalize_method_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromStr for Method {
    type Err = DrtpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_method_name(s).replace('_', "-").as_str() {
            "stop-and-wait" | "saw" => Ok(Self::StopAndWait),
            "go-back-n" | "gbn" => Ok(Self::GoBackN),
            "go-back-n-selective-repeat" | "gbn-sr" | "sr" => Ok(Self::SelectiveRepeat),
            _ => Err(DrtpError::UnknownMethod(s.to_string())),
        }
    }
}

/// Settings for the sending peer.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: SocketAddr,
    pub method: Method,
    /// Packets in flight for GBN / GBN-SR; ignored for SAW.
    pub window: u16,
    pub file: PathBuf,
    pub timer: TimerConfig,
    pub faults: Faults,
}

impl ClientConfig {
    pub fn new(server: SocketAddr, method: Method, file: impl Into<PathBuf>) -> Self {
        Self {
            server,
            method,
            window: DEFAULT_WINDOW,
            file: file.into(),
            timer: TimerConfig::default(),
            faults: Faults::default(),
        }
    }

    /// Window advertised in the SYN: 1 under SAW.
    pub fn effective_window(&self) -> u16 {
        if self.method.is_windowed() {
            self.window.max(1)
        } else {
            1
        }
    }
}

/// Settings for the receiving peer.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub method: Method,
    pub output: PathBuf,
    pub timer: TimerConfig,
    pub faults: Faults,
}

impl ServerConfig {
    pub fn new(bind: SocketAddr, method: Method, output: impl Into<PathBuf>) -> Self {
        Self {
            bind,
            method,
            output: output.into(),
            timer: TimerConfig::default(),
            faults: Faults::default(),
        }
    }
}
