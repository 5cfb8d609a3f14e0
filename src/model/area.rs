//! Public message areas and the posts they hold.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One area the user has access to, as listed by the message store.
///
/// Areas are numbered by their position in that list, starting at 1.
/// The same number is used for `conf_num`, the `NNN.NDX` file name, the
/// `CONTROL.DAT` area list and the reply `msgnum` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaInfo {
    pub name: String,
    /// Whether the user wants this area in their packets.
    pub include_in_scan: bool,
}

/// A post as stored in an area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPost {
    /// Monotonic sequence number compared against the user's read pointer.
    pub sequence: u32,
    pub from: String,
    /// System the post came from, for network posts.
    pub origin_system: Option<String>,
    /// Addressee, when the post names one.
    pub to: Option<String>,
    pub title: String,
    /// Internal text: CR line endings, color and routing codes.
    pub body: Vec<u8>,
    pub posted: NaiveDateTime,
    pub validated: bool,
    pub deleted: bool,
}

impl StoredPost {
    /// Hidden posts are exported only to privileged users.
    pub fn is_hidden(&self) -> bool {
        !self.validated || self.deleted
    }
}

/// A post to be written to an area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingPost {
    pub from: String,
    pub to: String,
    pub title: String,
    pub body: Vec<u8>,
}
