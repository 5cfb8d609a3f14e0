//! Sequential reader for reply `.MSG` files.
//!
//! A reply file has the same shape as `MESSAGES.DAT`: one signature
//! record, then for every message a header record followed by
//! `amount_blocks - 1` body records.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{QwkError, Result};
use crate::format::record::{QwkRecord, RECORD_SIZE};

/// Size of the internal read buffer.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// One message as found in the file, before any decoding.
#[derive(Debug, Clone)]
pub struct RawReply {
    /// 1-based record number of the header (the signature is record 1).
    pub record: u64,
    pub header: QwkRecord,
    /// Body records concatenated, still in wire form.
    pub body: Vec<u8>,
}

/// Reads records one at a time.
///
/// Failures to make sense of the file surface as
/// [`QwkError::CorruptReplyHeader`] with `dispatched` left at zero; the
/// caller knows how many messages went out before.
pub struct ReplyReader<R> {
    path: PathBuf,
    inner: R,
    /// Records consumed so far.
    records: u64,
    signature_read: bool,
}

impl ReplyReader<BufReader<File>> {
    /// Open a reply file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| QwkError::io(&path, e))?;
        Ok(Self::new(
            BufReader::with_capacity(READ_BUFFER_SIZE, file),
            path,
        ))
    }
}

impl<R: Read> ReplyReader<R> {
    /// Wrap any reader; `path` is only used in error messages.
    pub fn new(inner: R, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            inner,
            records: 0,
            signature_read: false,
        }
    }

    /// Records consumed so far.
    pub fn records_read(&self) -> u64 {
        self.records
    }

    /// Read and return the signature record. `Ok(None)` for an empty file.
    pub fn read_signature(&mut self) -> Result<Option<[u8; RECORD_SIZE]>> {
        self.signature_read = true;
        let mut buf = [0u8; RECORD_SIZE];
        match self.read_record(&mut buf)? {
            0 => Ok(None),
            RECORD_SIZE => Ok(Some(buf)),
            _ => Err(self.corrupt(1, "truncated signature record")),
        }
    }

    /// Read the next message. `Ok(None)` at a clean end of file.
    pub fn next_reply(&mut self) -> Result<Option<RawReply>> {
        if !self.signature_read && self.read_signature()?.is_none() {
            return Ok(None);
        }

        let record = self.records + 1;
        let mut buf = [0u8; RECORD_SIZE];
        match self.read_record(&mut buf)? {
            0 => return Ok(None),
            RECORD_SIZE => {}
            _ => return Err(self.corrupt(record, "truncated header record")),
        }
        let header = QwkRecord::from_bytes(&buf);

        let amount = match header.amount_blocks() {
            Some(0) | None => {
                return Err(self.corrupt(
                    record,
                    format!(
                        "bad block count {:?}",
                        String::from_utf8_lossy(&header.amount_blocks)
                    ),
                ))
            }
            Some(n) => n,
        };

        // The block count is untrusted; grow as records actually arrive.
        let mut body = Vec::new();
        for read in 0..amount - 1 {
            let n = self.read_record(&mut buf)?;
            if n != RECORD_SIZE {
                return Err(self.corrupt(
                    record,
                    format!("body ends after {read} of {} records", amount - 1),
                ));
            }
            body.extend_from_slice(&buf);
        }

        debug!(record, blocks = amount, "Read reply");
        Ok(Some(RawReply {
            record,
            header,
            body,
        }))
    }

    /// Fill `buf` as far as the file allows. Returns the bytes read; a
    /// whole record counts towards [`records_read`].
    ///
    /// [`records_read`]: ReplyReader::records_read
    fn read_record(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(QwkError::io(&self.path, e)),
            }
        }
        if filled == buf.len() {
            self.records += 1;
        }
        Ok(filled)
    }

    fn corrupt(&self, record: u64, reason: impl Into<String>) -> QwkError {
        QwkError::CorruptReplyHeader {
            record,
            dispatched: 0,
            reason: format!("{}: {}", self.path.display(), reason.into()),
        }
    }
}
