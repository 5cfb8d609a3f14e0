//! The packet owner's preferences.

use serde::{Deserialize, Serialize};

use crate::text::ColorMode;

/// Who the packet is for and how they want it built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    /// User name as known to the board.
    pub name: String,
    /// Privileged users also receive unvalidated and deleted posts.
    pub privileged: bool,
    /// Include private mail in the packet.
    pub scan_mail: bool,
    /// Order mail newest first instead of oldest first.
    pub mail_newest_first: bool,
    /// Color code handling in exported text.
    pub color: ColorMode,
    /// Keep routing lines in exported text.
    pub keep_routing: bool,
    /// Advance read pointers after a completed packet.
    pub update_read_pointers: bool,
    /// Remove exported mail from the mailbox after a completed packet.
    pub delete_mail_after_download: bool,
    /// Copy hello/news/bye and bulletin files into the packet.
    pub include_bulletins: bool,
    /// Personal packet size limit. 0 uses the system limit.
    pub max_messages: u32,
    /// Per-area limit. 0 means unlimited.
    pub max_per_area: u32,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: String::new(),
            privileged: false,
            scan_mail: true,
            mail_newest_first: false,
            color: ColorMode::Strip,
            keep_routing: false,
            update_read_pointers: true,
            delete_mail_after_download: false,
            include_bulletins: true,
            max_messages: 0,
            max_per_area: 0,
        }
    }
}
