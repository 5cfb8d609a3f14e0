//! Export: building a QWK packet from a user's areas and mail.

pub mod builder;
pub mod encoder;
pub mod finish;

use std::path::PathBuf;

use serde::Serialize;

use crate::config::Config;

pub use builder::PacketBuilder;
pub use encoder::{encode, EncodeInput, EncodedMessage};

/// Packet limits, fixed for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSettings {
    /// Messages per packet, mail included. 0 = unlimited.
    pub max_total: u32,
    /// Messages per area. 0 = unlimited.
    pub max_per_area: u32,
    /// Export the newest `percent`% of every area instead of the unread
    /// messages.
    pub percent: Option<u8>,
}

impl ExportSettings {
    /// Limits from configuration. The user's own maximum applies when it
    /// is set and tighter than the system's.
    pub fn from_config(config: &Config) -> Self {
        let system = config.system.max_messages;
        let user = config.user.max_messages;
        let max_total = match (system, user) {
            (0, u) => u,
            (s, 0) => s,
            (s, u) => s.min(u),
        };
        Self {
            max_total,
            max_per_area: config.user.max_per_area,
            percent: None,
        }
    }
}

/// Why scanning ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStop {
    /// Every eligible message was visited.
    Completed,
    /// The packet-wide maximum was reached.
    Quota,
    /// The abort flag was raised, or the disk filled up.
    Aborted,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportOutcome {
    /// The packet was archived and handed to the transport.
    Done,
    /// The user discarded a partial packet.
    Discarded,
    /// The transfer failed and the user gave up.
    Undelivered,
}

/// Per-area summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AreaReport {
    pub number: u16,
    pub name: String,
    pub total: u32,
    pub exported: u32,
    /// The per-area maximum cut the area short.
    pub truncated: bool,
}

/// Summary of one export session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub outcome: ExportOutcome,
    pub stop: ScanStop,
    pub packet_name: String,
    /// Archive handed to the transport, when there was one.
    pub packet_path: Option<PathBuf>,
    pub packet_size: u64,
    pub mail: u32,
    pub messages: u32,
    pub areas: Vec<AreaReport>,
    pub disk_exhausted: bool,
}
