//! Decoding replies and routing them to areas or the mailbox.

use std::collections::HashSet;
use std::io::Read;

use tracing::{debug, info, warn};

use crate::error::{QwkError, Result, StoreError};
use crate::format::record::{QwkRecord, STATUS_PUBLIC, STATUS_PUBLIC_READ};
use crate::import::address;
use crate::import::reader::{RawReply, ReplyReader};
use crate::import::ImportSummary;
use crate::model::{AddressChoice, Destination, OutgoingMail, OutgoingPost, ReplyMessage};
use crate::session::{AddressPick, ImportContext};
use crate::text;

/// Where a header says its message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Mailbox,
    Area(u16),
    /// Addressed to an area but marked private; the caller decides.
    PrivateToArea(u16),
}

/// Classify a reply header by its `msgnum` and `status` fields.
///
/// `msgnum` is read like C `atoi`: leading digits after optional spaces,
/// anything else ends the number, no digits means zero.
pub fn classify(header: &QwkRecord) -> Classification {
    let area = leading_number(&header.msgnum);
    if area == 0 {
        return Classification::Mailbox;
    }
    // No board has this many areas; the range check rejects it later.
    let area = u16::try_from(area).unwrap_or(u16::MAX);
    if header.status == STATUS_PUBLIC || header.status == STATUS_PUBLIC_READ {
        Classification::Area(area)
    } else {
        Classification::PrivateToArea(area)
    }
}

fn leading_number(field: &[u8]) -> u64 {
    field
        .iter()
        .skip_while(|b| **b == b' ')
        .take_while(|b| b.is_ascii_digit())
        .fold(0u64, |n, b| n.saturating_mul(10).saturating_add(u64::from(b - b'0')))
}

/// Decode a raw reply. Private messages to an area keep their area
/// destination with `private` set.
pub fn decode(raw: &RawReply) -> ReplyMessage {
    let (destination, private) = match classify(&raw.header) {
        Classification::Mailbox => (
            Destination::Mailbox,
            raw.header.status != STATUS_PUBLIC && raw.header.status != STATUS_PUBLIC_READ,
        ),
        Classification::Area(n) => (Destination::Area(n), false),
        Classification::PrivateToArea(n) => (Destination::Area(n), true),
    };
    let body = text::from_wire(&raw.body);
    let forwarding_address = text::find_forwarding_address(&body);

    let mut msg = ReplyMessage {
        destination,
        private,
        to: raw.header.to_text().trim().to_uppercase(),
        title: raw.header.subject_text(),
        body,
        forwarding_address,
        ambiguity: None,
    };
    if destination == Destination::Mailbox {
        route_to_mailbox(&mut msg);
    }
    msg
}

/// Send the message to the mailbox, noting any disagreement between the
/// record's `to` and the address found in the body.
pub fn route_to_mailbox(msg: &mut ReplyMessage) {
    msg.destination = Destination::Mailbox;
    msg.ambiguity = match &msg.forwarding_address {
        Some(embedded) if *embedded != msg.to => Some(AddressChoice {
            record_to: msg.to.clone(),
            embedded: embedded.clone(),
        }),
        _ => None,
    };
}

/// Walks a reply file and dispatches every message in it.
pub struct ReplyPacketParser<'c, 'a> {
    ctx: &'c mut ImportContext<'a>,
    /// Name the replies are posted under.
    sender: String,
    summary: ImportSummary,
}

impl<'c, 'a> ReplyPacketParser<'c, 'a> {
    pub fn new(ctx: &'c mut ImportContext<'a>, sender: impl Into<String>) -> Self {
        Self {
            ctx,
            sender: sender.into(),
            summary: ImportSummary::default(),
        }
    }

    /// Process every message. A corrupt record stops the import; the
    /// error reports how many messages were already dispatched.
    pub fn run<R: Read>(mut self, reader: &mut ReplyReader<R>) -> Result<ImportSummary> {
        loop {
            let raw = match reader.next_reply() {
                Ok(Some(raw)) => raw,
                Ok(None) => break,
                Err(QwkError::CorruptReplyHeader { record, reason, .. }) => {
                    let dispatched = self.summary.dispatched();
                    warn!(record, dispatched, %reason, "Corrupt reply packet");
                    return Err(QwkError::CorruptReplyHeader {
                        record,
                        dispatched,
                        reason,
                    });
                }
                Err(e) => return Err(e),
            };
            self.dispatch(decode(&raw), raw.record)?;
        }
        info!(
            posted = self.summary.posted,
            mailed = self.summary.mailed,
            skipped = self.summary.skipped,
            declined = self.summary.declined,
            rejected = self.summary.rejected,
            "Reply packet processed"
        );
        Ok(self.summary)
    }

    /// Route one decoded message.
    pub fn dispatch(&mut self, mut msg: ReplyMessage, record: u64) -> Result<()> {
        if let (Destination::Area(area), true) = (msg.destination, msg.private) {
            if self
                .ctx
                .prompt
                .route_private_to_mailbox(&msg.title, &msg.to, area)
            {
                route_to_mailbox(&mut msg);
            }
        }

        if msg.body.is_empty() {
            debug!(record, "Skipping reply with empty body");
            self.summary.skipped += 1;
            return Ok(());
        }

        match msg.destination {
            Destination::Mailbox => self.send_mail(msg),
            Destination::Area(area) => self.post(msg, area),
        }
    }

    fn send_mail(&mut self, msg: ReplyMessage) -> Result<()> {
        let mut to = msg.to.clone();
        if let Some(choice) = &msg.ambiguity {
            if self
                .ctx
                .prompt
                .choose_address(&choice.record_to, &choice.embedded)
                == AddressPick::Embedded
            {
                to = choice.embedded.clone();
            }
        }
        let to = address::normalize(&to);
        if to.is_empty() {
            warn!(title = %msg.title, "Mail reply has no recipient");
            self.summary.rejected += 1;
            return Ok(());
        }

        let mail = OutgoingMail {
            from: self.sender.clone(),
            to: to.clone(),
            title: msg.title,
            body: msg.body,
        };
        match self.ctx.board.deliver(mail) {
            Ok(()) => {
                info!(%to, "Mail delivered");
                self.summary.mailed += 1;
                Ok(())
            }
            Err(e) => self.refused(e, &to),
        }
    }

    fn post(&mut self, msg: ReplyMessage, area: u16) -> Result<()> {
        let count = self.ctx.board.areas().len();
        let mut tried = HashSet::new();
        let mut target = area;

        loop {
            tried.insert(target);
            let in_range = target >= 1 && usize::from(target) <= count;
            if in_range && self.ctx.board.can_post(target) {
                break;
            }
            warn!(area = target, title = %msg.title, "Cannot post to area");
            match self.ctx.prompt.redirect_post(&msg.title, target) {
                Some(other) if !tried.contains(&other) => target = other,
                _ => {
                    self.summary.declined += 1;
                    return Ok(());
                }
            }
        }

        let post = OutgoingPost {
            from: self.sender.clone(),
            to: if msg.to.is_empty() { "ALL".to_string() } else { msg.to },
            title: msg.title,
            body: msg.body,
        };
        let label = format!("area {target}");
        if let Err(e) = self.ctx.board.open_area(target) {
            return self.refused(e, &label);
        }
        let posted = self.ctx.board.post(target, post);
        self.ctx.board.close_area(target);
        match posted {
            Ok(()) => {
                info!(area = target, "Reply posted");
                self.summary.posted += 1;
                Ok(())
            }
            Err(e) => self.refused(e, &label),
        }
    }

    /// The board turned a message down. Storage failures end the import;
    /// anything else is counted and skipped.
    fn refused(&mut self, e: StoreError, target: &str) -> Result<()> {
        match e {
            StoreError::Io(_) => Err(e.into()),
            other => {
                warn!(%target, error = %other, "Reply rejected");
                self.summary.rejected += 1;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(msgnum: &[u8; 7], status: u8) -> QwkRecord {
        let mut rec = QwkRecord::blank();
        rec.msgnum = *msgnum;
        rec.status = status;
        rec
    }

    #[test]
    fn test_zero_msgnum_is_mailbox() {
        assert_eq!(classify(&header(b"0000000", b' ')), Classification::Mailbox);
        assert_eq!(classify(&header(b"       ", b'-')), Classification::Mailbox);
        assert_eq!(classify(&header(b"0      ", b'*')), Classification::Mailbox);
    }

    #[test]
    fn test_public_area() {
        assert_eq!(classify(&header(b"0000005", b' ')), Classification::Area(5));
        assert_eq!(classify(&header(b"12     ", b'-')), Classification::Area(12));
    }

    #[test]
    fn test_private_to_area() {
        assert_eq!(
            classify(&header(b"0000005", b'X')),
            Classification::PrivateToArea(5)
        );
        assert_eq!(
            classify(&header(b"3      ", b'+')),
            Classification::PrivateToArea(3)
        );
    }

    #[test]
    fn test_msgnum_read_like_atoi() {
        assert_eq!(classify(&header(b"  7x   ", b' ')), Classification::Area(7));
        assert_eq!(classify(&header(b"abc    ", b' ')), Classification::Mailbox);
    }

    #[test]
    fn test_decode_mailbox_with_ambiguity() {
        let mut h = header(b"0      ", b'+');
        h.set_to("sysop");
        h.set_subject("Hi there");
        let raw = RawReply {
            record: 2,
            header: h,
            body: b"\x040QWKFrom:OTHER@3\xE3\xE3Hello   ".to_vec(),
        };
        let msg = decode(&raw);
        assert_eq!(msg.destination, Destination::Mailbox);
        assert!(msg.private);
        assert_eq!(msg.to, "SYSOP");
        assert_eq!(msg.title, "Hi there");
        assert_eq!(msg.body, b"\x040QWKFrom:OTHER@3\r\n\r\nHello");
        assert_eq!(msg.forwarding_address.as_deref(), Some("OTHER@3"));
        assert_eq!(
            msg.ambiguity,
            Some(AddressChoice {
                record_to: "SYSOP".into(),
                embedded: "OTHER@3".into(),
            })
        );
    }

    #[test]
    fn test_decode_matching_address_is_not_ambiguous() {
        let mut h = header(b"0      ", b' ');
        h.set_to("OTHER@3");
        let raw = RawReply {
            record: 2,
            header: h,
            body: b"\x040QWKFrom:other@3\xE3Text".to_vec(),
        };
        assert_eq!(decode(&raw).ambiguity, None);
    }

    #[test]
    fn test_decode_private_area_keeps_area() {
        let raw = RawReply {
            record: 2,
            header: header(b"0000005", b'X'),
            body: b"Body".to_vec(),
        };
        let msg = decode(&raw);
        assert_eq!(msg.destination, Destination::Area(5));
        assert!(msg.private);
        assert_eq!(msg.ambiguity, None);
    }
}
