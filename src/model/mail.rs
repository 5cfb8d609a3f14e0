//! Private mail.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A message waiting in a user's mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailItem {
    /// Mailbox-wide identifier, used to remove the message after download.
    pub id: u64,
    pub from: String,
    pub origin_system: Option<String>,
    pub to: String,
    pub title: String,
    pub body: Vec<u8>,
    pub sent: NaiveDateTime,
    /// Whether the recipient has already read it.
    pub read: bool,
}

/// Mail to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    /// Normalized recipient address.
    pub to: String,
    pub title: String,
    pub body: Vec<u8>,
}
