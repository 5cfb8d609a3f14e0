//! Messages decoded from a reply packet.

use std::fmt;

/// Where a reply goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Private mail (`msgnum` 0 or blank).
    Mailbox,
    /// A public area, 1-based.
    Area(u16),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mailbox => write!(f, "mailbox"),
            Self::Area(n) => write!(f, "area {n}"),
        }
    }
}

/// Two candidate recipients for a mailbox reply: the record's `to` field
/// and the address stamped into the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressChoice {
    pub record_to: String,
    pub embedded: String,
}

/// One reply, reassembled and decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyMessage {
    pub destination: Destination,
    /// Status byte marked the message private.
    pub private: bool,
    /// Upper-cased, trimmed `to` field.
    pub to: String,
    pub title: String,
    /// Body with CRLF line endings and trailing spaces removed.
    pub body: Vec<u8>,
    /// Address recovered from a `QWKFrom:` line in the body.
    pub forwarding_address: Option<String>,
    /// Set when the recovered address differs from `to`.
    pub ambiguity: Option<AddressChoice>,
}
