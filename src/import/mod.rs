//! Import: unpacking a reply packet and dispatching its messages.

pub mod address;
pub mod parser;
pub mod reader;

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::error::{QwkError, Result};
use crate::export::finish::clear_directory;
use crate::format;
use crate::session::ImportContext;

pub use parser::{classify, decode, Classification, ReplyPacketParser};
pub use reader::{RawReply, ReplyReader};

/// Counts of what happened to the messages of one reply packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Posted to an area.
    pub posted: u32,
    /// Delivered as mail.
    pub mailed: u32,
    /// Empty bodies.
    pub skipped: u32,
    /// No usable area and no redirect.
    pub declined: u32,
    /// Turned down by the board.
    pub rejected: u32,
}

impl ImportSummary {
    /// Messages handed to the board successfully.
    pub fn dispatched(&self) -> usize {
        (self.posted + self.mailed) as usize
    }
}

/// Process an already extracted reply file.
pub fn process_reply_file(
    ctx: &mut ImportContext<'_>,
    sender: &str,
    path: &Path,
) -> Result<ImportSummary> {
    let mut reader = ReplyReader::open(path)?;
    info!(path = %path.display(), "Processing reply file");
    ReplyPacketParser::new(ctx, sender).run(&mut reader)
}

/// Receive (unless `archive` is given), extract and process a reply
/// packet. Returns `Ok(None)` when nothing was received.
///
/// The archive is unpacked into `work_dir/rep`.
pub fn import_reply_packet(
    ctx: &mut ImportContext<'_>,
    config: &Config,
    work_dir: &Path,
    archive: Option<PathBuf>,
) -> Result<Option<ImportSummary>> {
    let name = format::packet_name(config.system.packet_name.as_deref(), &config.system.name);
    let dir = work_dir.join("rep");
    clear_directory(&dir)?;

    let archive = match archive {
        Some(path) => path,
        None => {
            let Some(transport) = ctx.transport.as_deref_mut() else {
                return Err(QwkError::Transport(
                    "no reply archive given and no transport to receive one".into(),
                ));
            };
            match transport.receive(&dir, &format::reply_archive_file(&name))? {
                Some(path) => path,
                None => {
                    info!("No reply packet received");
                    return Ok(None);
                }
            }
        }
    };

    let msg_name = format::reply_message_file(&name);
    let extracted = ctx.archiver.extract(&archive, &msg_name, &dir)?;
    if !extracted.is_file() {
        return Err(QwkError::Archive(format!(
            "{} does not contain {msg_name}",
            archive.display()
        )));
    }

    process_reply_file(ctx, &config.user.name, &extracted).map(Some)
}
