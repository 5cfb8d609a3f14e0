//! Collaborator interfaces and the per-session context.
//!
//! The codec never talks to storage, archivers, file transfer or the user
//! directly. Everything goes through the traits below, handed in as an
//! [`ExportContext`] or [`ImportContext`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, StoreError};
use crate::model::{AreaInfo, MailItem, OutgoingMail, OutgoingPost, StoredPost};

/// Public message areas as seen by one user.
///
/// Areas are addressed by 1-based number (position in [`areas`] plus one)
/// and posts by 1-based index within their area.
///
/// [`areas`]: MessageStore::areas
pub trait MessageStore {
    /// Areas the user can see, in numbering order.
    fn areas(&self) -> Vec<AreaInfo>;

    /// Enter the area's exclusive scope. Paired with [`close_area`].
    ///
    /// [`close_area`]: MessageStore::close_area
    fn open_area(&mut self, area: u16) -> std::result::Result<(), StoreError>;

    /// Leave the area's exclusive scope.
    fn close_area(&mut self, area: u16);

    /// Number of posts in the area.
    fn message_count(&self, area: u16) -> u32;

    /// Sequence number of the post at `index`, without loading its text.
    fn post_sequence(&self, area: u16, index: u32) -> Option<u32>;

    /// Load the post at `index`.
    fn read_post(&self, area: u16, index: u32) -> std::result::Result<StoredPost, StoreError>;

    /// The user's read pointer for the area.
    fn last_read(&self, area: u16) -> u32;

    fn set_last_read(&mut self, area: u16, sequence: u32);

    /// Whether the user may post to the area right now.
    fn can_post(&self, area: u16) -> bool;

    fn post(&mut self, area: u16, post: OutgoingPost) -> std::result::Result<(), StoreError>;
}

/// Private mail.
pub trait Mailbox {
    /// Mail addressed to `user`, oldest first.
    fn messages_for_user(&self, user: &str) -> std::result::Result<Vec<MailItem>, StoreError>;

    fn deliver(&mut self, mail: OutgoingMail) -> std::result::Result<(), StoreError>;

    /// Remove mail by id. Unknown ids are ignored.
    fn remove_messages(&mut self, ids: &[u64]) -> std::result::Result<(), StoreError>;
}

/// A board offers both areas and mail.
pub trait Board: MessageStore + Mailbox {}

impl<T: MessageStore + Mailbox> Board for T {}

/// External archiver program.
pub trait Archiver {
    /// Pack every file in `dir` into `archive_path`.
    fn archive(&self, dir: &Path, archive_path: &Path) -> Result<()>;

    /// Extract the files matching `pattern` from `archive` into `dest_dir`
    /// and return the path of the extracted file.
    fn extract(&self, archive: &Path, pattern: &str, dest_dir: &Path) -> Result<PathBuf>;
}

/// Moves packets between the board and the user.
pub trait Transport {
    /// Deliver a finished packet. `Ok(false)` means the transfer did not
    /// complete and may be retried.
    fn send(&mut self, path: &Path) -> Result<bool>;

    /// Fetch an uploaded reply archive named `file_name` into `dest_dir`.
    /// `Ok(None)` means nothing was received.
    fn receive(&mut self, dest_dir: &Path, file_name: &str) -> Result<Option<PathBuf>>;
}

/// Which of two candidate addresses to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPick {
    /// The record's `to` field.
    Record,
    /// The address stamped into the body.
    Embedded,
}

/// Decisions the codec never makes on its own.
pub trait Prompt {
    /// The export was aborted; keep what was written so far?
    fn keep_partial(&mut self) -> bool;

    /// A reply marked private is addressed to a public area; send it as
    /// mail instead?
    fn route_private_to_mailbox(&mut self, title: &str, to: &str, area: u16) -> bool;

    /// The record and the body disagree on the recipient.
    fn choose_address(&mut self, record_to: &str, embedded: &str) -> AddressPick;

    /// Sending the packet failed; try again?
    fn retry_transfer(&mut self) -> bool;

    /// Posting to `area` is not possible. Return another area to use, or
    /// `None` to skip the message.
    fn redirect_post(&mut self, title: &str, area: u16) -> Option<u16>;
}

/// Cooperative cancellation shared between a session and its caller.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the session to stop at its next poll.
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything an export session talks to.
pub struct ExportContext<'a> {
    pub board: &'a mut dyn Board,
    pub archiver: &'a dyn Archiver,
    pub transport: &'a mut dyn Transport,
    pub prompt: &'a mut dyn Prompt,
    pub abort: AbortFlag,
}

/// Everything an import session talks to.
pub struct ImportContext<'a> {
    pub board: &'a mut dyn Board,
    pub archiver: &'a dyn Archiver,
    pub transport: Option<&'a mut dyn Transport>,
    pub prompt: &'a mut dyn Prompt,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_flag_is_shared() {
        let flag = AbortFlag::new();
        let other = flag.clone();
        assert!(!flag.is_set());
        other.set();
        assert!(flag.is_set());
        flag.clear();
        assert!(!other.is_set());
    }
}
