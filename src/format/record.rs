//! The fixed 128-byte QWK record.
//!
//! ```text
//! ┌────────┬──────┬───────────────┐
//! │ offset │ size │ field         │
//! ├────────┼──────┼───────────────┤
//! │      0 │    1 │ status        │
//! │      1 │    7 │ msgnum        │
//! │      8 │    8 │ date MM-DD-YY │
//! │     16 │    5 │ time HH:MM    │
//! │     21 │   25 │ to            │
//! │     46 │   25 │ from          │
//! │     71 │   25 │ subject       │
//! │     96 │   12 │ password      │
//! │    108 │    8 │ reference     │
//! │    116 │    6 │ amount_blocks │
//! │    122 │    1 │ flag          │
//! │    123 │    2 │ conf_num (LE) │
//! │    125 │    2 │ logical (LE)  │
//! │    127 │    1 │ tagline       │
//! └────────┴──────┴───────────────┘
//! ```
//!
//! Text fields are ASCII, space padded, never NUL terminated. Body blocks
//! share the same 128-byte shape and carry raw message text.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{QwkError, Result};

/// Size of every record in `MESSAGES.DAT` and reply `.MSG` files.
pub const RECORD_SIZE: usize = 128;

/// Bytes of the header that hold text (everything before `conf_num`).
pub const TEXT_PORTION: usize = 123;

/// Text of the first record of every `MESSAGES.DAT`. Readers only check
/// that a record is present; the wording is conventional.
pub const SIGNATURE_TEXT: &str =
    "Produced by Qmail...Copyright (c) 1987 by Sparkware.  All Rights Reserved (For Compatibility with Qmail)";

/// Status byte of a public message nobody has read yet.
pub const STATUS_PUBLIC: u8 = b' ';
/// Status byte of a public message that has been read.
pub const STATUS_PUBLIC_READ: u8 = b'-';
/// Status byte of unread private mail.
pub const STATUS_PRIVATE: u8 = b'+';
/// Status byte of private mail the recipient already read.
pub const STATUS_PRIVATE_READ: u8 = b'*';

/// One decoded header record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QwkRecord {
    pub status: u8,
    pub msgnum: [u8; 7],
    pub date: [u8; 8],
    pub time: [u8; 5],
    pub to: [u8; 25],
    pub from: [u8; 25],
    pub subject: [u8; 25],
    pub password: [u8; 12],
    pub reference: [u8; 8],
    pub amount_blocks: [u8; 6],
    pub flag: u8,
    pub conf_num: u16,
    pub logical_num: u16,
    pub tagline: u8,
}

impl Default for QwkRecord {
    fn default() -> Self {
        Self::blank()
    }
}

impl QwkRecord {
    /// A record with every text field set to spaces and both numbers zero.
    pub fn blank() -> Self {
        Self {
            status: STATUS_PUBLIC,
            msgnum: [b' '; 7],
            date: [b' '; 8],
            time: [b' '; 5],
            to: [b' '; 25],
            from: [b' '; 25],
            subject: [b' '; 25],
            password: [b' '; 12],
            reference: [b' '; 8],
            amount_blocks: [b' '; 6],
            flag: b' ',
            conf_num: 0,
            logical_num: 0,
            tagline: b' ',
        }
    }

    /// Serialize into the on-disk layout. NUL bytes anywhere in the text
    /// portion come out as spaces.
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [b' '; RECORD_SIZE];
        buf[0] = self.status;
        buf[1..8].copy_from_slice(&self.msgnum);
        buf[8..16].copy_from_slice(&self.date);
        buf[16..21].copy_from_slice(&self.time);
        buf[21..46].copy_from_slice(&self.to);
        buf[46..71].copy_from_slice(&self.from);
        buf[71..96].copy_from_slice(&self.subject);
        buf[96..108].copy_from_slice(&self.password);
        buf[108..116].copy_from_slice(&self.reference);
        buf[116..122].copy_from_slice(&self.amount_blocks);
        buf[122] = self.flag;
        replace_nul(&mut buf[..TEXT_PORTION]);
        LittleEndian::write_u16(&mut buf[123..125], self.conf_num);
        LittleEndian::write_u16(&mut buf[125..127], self.logical_num);
        buf[127] = if self.tagline == 0 { b' ' } else { self.tagline };
        buf
    }

    /// Parse a record from its on-disk layout.
    pub fn from_bytes(buf: &[u8; RECORD_SIZE]) -> Self {
        let mut rec = Self::blank();
        rec.status = buf[0];
        rec.msgnum.copy_from_slice(&buf[1..8]);
        rec.date.copy_from_slice(&buf[8..16]);
        rec.time.copy_from_slice(&buf[16..21]);
        rec.to.copy_from_slice(&buf[21..46]);
        rec.from.copy_from_slice(&buf[46..71]);
        rec.subject.copy_from_slice(&buf[71..96]);
        rec.password.copy_from_slice(&buf[96..108]);
        rec.reference.copy_from_slice(&buf[108..116]);
        rec.amount_blocks.copy_from_slice(&buf[116..122]);
        rec.flag = buf[122];
        rec.conf_num = LittleEndian::read_u16(&buf[123..125]);
        rec.logical_num = LittleEndian::read_u16(&buf[125..127]);
        rec.tagline = buf[127];
        rec
    }

    /// Store a number as left-aligned decimal text in `msgnum`.
    pub fn set_msgnum(&mut self, n: u32) -> Result<()> {
        set_number(&mut self.msgnum, n as u64, "msgnum")
    }

    /// Store the block count (header included) in `amount_blocks`.
    pub fn set_amount_blocks(&mut self, n: usize) -> Result<()> {
        set_number(&mut self.amount_blocks, n as u64, "amount_blocks")
    }

    /// Decode `msgnum`. A blank field reads as zero.
    pub fn msgnum(&self) -> Option<u32> {
        parse_number(&self.msgnum).map(|n| n as u32)
    }

    /// Decode `amount_blocks`.
    pub fn amount_blocks(&self) -> Option<usize> {
        parse_number(&self.amount_blocks).map(|n| n as usize)
    }

    pub fn set_to(&mut self, value: &str) {
        set_text(&mut self.to, value.as_bytes());
    }

    pub fn set_from(&mut self, value: &str) {
        set_text(&mut self.from, value.as_bytes());
    }

    pub fn set_subject(&mut self, value: &str) {
        set_text(&mut self.subject, value.as_bytes());
    }

    pub fn set_date(&mut self, value: &str) {
        set_text(&mut self.date, value.as_bytes());
    }

    pub fn set_time(&mut self, value: &str) {
        set_text(&mut self.time, value.as_bytes());
    }

    /// Recipient with padding removed.
    pub fn to_text(&self) -> String {
        field_text(&self.to)
    }

    /// Sender with padding removed.
    pub fn from_text(&self) -> String {
        field_text(&self.from)
    }

    /// Subject with padding removed.
    pub fn subject_text(&self) -> String {
        field_text(&self.subject)
    }

    /// `MM-DD-YY HH:MM` as stored.
    pub fn timestamp_text(&self) -> String {
        format!("{} {}", field_text(&self.date), field_text(&self.time))
            .trim()
            .to_string()
    }
}

/// Copy `value` into a fixed-width field: truncate, pad with spaces and
/// turn NUL bytes into spaces.
pub fn set_text(field: &mut [u8], value: &[u8]) {
    field.fill(b' ');
    let n = value.len().min(field.len());
    field[..n].copy_from_slice(&value[..n]);
    replace_nul(field);
}

/// Read a fixed-width field back as a string without trailing padding.
pub fn field_text(field: &[u8]) -> String {
    let end = field
        .iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map(|p| p + 1)
        .unwrap_or(0);
    field[..end].iter().map(|&b| b as char).collect()
}

/// Rewrite every NUL byte as a space.
pub fn replace_nul(buf: &mut [u8]) {
    for b in buf.iter_mut().filter(|b| **b == 0) {
        *b = b' ';
    }
}

fn set_number(field: &mut [u8], n: u64, name: &str) -> Result<()> {
    let text = n.to_string();
    if text.len() > field.len() {
        return Err(QwkError::InvalidRecord(format!(
            "{name} value {n} does not fit in {} characters",
            field.len()
        )));
    }
    set_text(field, text.as_bytes());
    Ok(())
}

fn parse_number(field: &[u8]) -> Option<u64> {
    let text = field_text(field);
    let text = text.trim();
    if text.is_empty() {
        return Some(0);
    }
    text.parse().ok()
}

/// Number of records a message occupies: one header plus enough body
/// blocks to hold `body_len` bytes.
pub fn amount_blocks(body_len: usize) -> usize {
    body_len.div_ceil(RECORD_SIZE) + 1
}

/// The signature record written first in every packet.
pub fn signature_record() -> [u8; RECORD_SIZE] {
    let mut buf = [b' '; RECORD_SIZE];
    set_text(&mut buf, SIGNATURE_TEXT.as_bytes());
    buf
}

/// Split wire text into body blocks. The last block is padded with
/// spaces; NUL bytes become spaces.
pub fn body_blocks(text: &[u8]) -> Vec<[u8; RECORD_SIZE]> {
    text.chunks(RECORD_SIZE)
        .map(|chunk| {
            let mut block = [b' '; RECORD_SIZE];
            block[..chunk.len()].copy_from_slice(chunk);
            replace_nul(&mut block);
            block
        })
        .collect()
}
