//! Turns one message into a header record plus body blocks.

use std::io::Write;

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::format::record::{self, QwkRecord, RECORD_SIZE};
use crate::model::Destination;
use crate::text::{self, TextOptions};

/// Everything the encoder needs to know about one message.
#[derive(Debug, Clone)]
pub struct EncodeInput<'a> {
    /// Internal text.
    pub body: &'a [u8],
    pub from: &'a str,
    pub to: &'a str,
    pub title: &'a str,
    pub posted: NaiveDateTime,
    pub status: u8,
    pub destination: Destination,
    /// Message number within its area (or position in the mailbox).
    pub msgnum: u32,
    /// Running message counter of the packet.
    pub logical_num: u32,
    /// Sender stamp for [`text::to_wire`].
    pub stamp: &'a [u8],
}

/// A message ready to be appended to `MESSAGES.DAT`.
#[derive(Debug, Clone)]
pub struct EncodedMessage {
    pub header: QwkRecord,
    pub blocks: Vec<[u8; RECORD_SIZE]>,
}

impl EncodedMessage {
    /// Header plus body blocks.
    pub fn amount_blocks(&self) -> usize {
        self.blocks.len() + 1
    }

    /// The message as it lands on disk.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.amount_blocks() * RECORD_SIZE);
        out.extend_from_slice(&self.header.to_bytes());
        for block in &self.blocks {
            out.extend_from_slice(block);
        }
        out
    }

    pub fn write_to(&self, w: &mut impl Write) -> std::io::Result<()> {
        w.write_all(&self.to_bytes())
    }
}

/// Encode one message.
///
/// `to` and `from` are upper-cased; `from` and `title` lose their color
/// codes. Text longer than a field is cut at the field width.
pub fn encode(input: &EncodeInput<'_>, opts: &TextOptions) -> Result<EncodedMessage> {
    let wire = text::to_wire(input.body, input.stamp, opts);
    let amount = record::amount_blocks(wire.len());

    let mut header = QwkRecord::blank();
    header.status = input.status;
    header.set_msgnum(input.msgnum)?;
    header.set_date(&input.posted.format("%m-%d-%y").to_string());
    header.set_time(&input.posted.format("%H:%M").to_string());
    header.set_to(&input.to.to_uppercase());
    header.set_from(&text::strip_colors_str(input.from).to_uppercase());
    header.set_subject(&text::strip_colors_str(input.title));
    header.set_amount_blocks(amount)?;
    header.conf_num = match input.destination {
        Destination::Mailbox => 0,
        Destination::Area(n) => n,
    };
    // The field is 16 bits wide; readers only use it for ordering.
    header.logical_num = (input.logical_num & 0xFFFF) as u16;

    let blocks = record::body_blocks(&wire);
    debug_assert_eq!(blocks.len() + 1, amount);

    Ok(EncodedMessage { header, blocks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::record::STATUS_PUBLIC;
    use chrono::NaiveDate;

    fn input<'a>(body: &'a [u8], destination: Destination) -> EncodeInput<'a> {
        EncodeInput {
            body,
            from: "\x032Jane Doe",
            to: "All",
            title: "\x031Meeting",
            posted: NaiveDate::from_ymd_opt(2023, 12, 1)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap(),
            status: STATUS_PUBLIC,
            destination,
            msgnum: 17,
            logical_num: 3,
            stamp: b"",
        }
    }

    #[test]
    fn test_header_fields() {
        let msg = encode(&input(b"Hello\r", Destination::Area(4)), &TextOptions::default()).unwrap();
        let h = &msg.header;
        assert_eq!(h.to_text(), "ALL");
        assert_eq!(h.from_text(), "JANE DOE");
        assert_eq!(h.subject_text(), "Meeting");
        assert_eq!(h.timestamp_text(), "12-01-23 08:30");
        assert_eq!(h.msgnum(), Some(17));
        assert_eq!(h.conf_num, 4);
        assert_eq!(h.logical_num, 3);
        assert_eq!(h.amount_blocks(), Some(2));
    }

    #[test]
    fn test_mailbox_is_conference_zero() {
        let msg = encode(&input(b"Hi", Destination::Mailbox), &TextOptions::default()).unwrap();
        assert_eq!(msg.header.conf_num, 0);
    }

    #[test]
    fn test_exact_record_body_has_no_padding_block() {
        let body = vec![b'a'; RECORD_SIZE];
        let msg = encode(&input(&body, Destination::Area(1)), &TextOptions::default()).unwrap();
        assert_eq!(msg.amount_blocks(), 2);
        assert_eq!(msg.header.amount_blocks(), Some(2));
        assert_eq!(msg.to_bytes().len(), 2 * RECORD_SIZE);
    }

    #[test]
    fn test_last_block_space_padded() {
        let body = vec![b'a'; RECORD_SIZE + 3];
        let msg = encode(&input(&body, Destination::Area(1)), &TextOptions::default()).unwrap();
        assert_eq!(msg.amount_blocks(), 3);
        let last = msg.blocks[1];
        assert_eq!(&last[..3], b"aaa");
        assert!(last[3..].iter().all(|&b| b == b' '));
    }

    #[test]
    fn test_no_nul_in_output() {
        let msg = encode(
            &EncodeInput {
                from: "A\0B",
                ..input(b"x\0y", Destination::Area(1))
            },
            &TextOptions::default(),
        )
        .unwrap();
        assert!(!msg.to_bytes()[..123].contains(&0));
        assert!(!msg.to_bytes()[RECORD_SIZE..].contains(&0));
    }

    #[test]
    fn test_logical_number_wraps_to_field() {
        let msg = encode(
            &EncodeInput {
                logical_num: 65_537,
                ..input(b"x", Destination::Area(1))
            },
            &TextOptions::default(),
        )
        .unwrap();
        assert_eq!(msg.header.logical_num, 1);
    }
}
