//! `.NDX` index streams.
//!
//! Every exported message gets one five-byte entry: the MBF-encoded
//! position of its header record (1-based, in records) and an unused byte.
//! Area messages go to `NNN.NDX`; mail goes to both `PERSONAL.NDX` and
//! `000.NDX`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{QwkError, Result};
use crate::format::msbin;
use crate::format::space::{Budgeted, SpaceBudget};

/// Size of one index entry on disk.
pub const INDEX_ENTRY_SIZE: usize = 5;

/// Index of mail addressed to the packet's owner.
pub const PERSONAL_INDEX: &str = "PERSONAL.NDX";

/// Index of the mailbox conference (conference zero).
pub const MAILBOX_INDEX: &str = "000.NDX";

/// File name of the index for a 1-based area number.
pub fn area_index_name(area_number: u16) -> String {
    format!("{area_number:03}.NDX")
}

/// One `{pos, unused}` index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub pos: [u8; 4],
    pub unused: u8,
}

impl IndexEntry {
    /// Entry pointing at the given record position.
    pub fn for_position(pos: u32) -> Result<Self> {
        Ok(Self {
            pos: msbin::encode_position(pos)?,
            unused: 0,
        })
    }

    /// The record position this entry points at.
    pub fn position(&self) -> u32 {
        msbin::decode_position(self.pos)
    }

    pub fn to_bytes(&self) -> [u8; INDEX_ENTRY_SIZE] {
        [self.pos[0], self.pos[1], self.pos[2], self.pos[3], self.unused]
    }

    pub fn from_bytes(buf: &[u8; INDEX_ENTRY_SIZE]) -> Self {
        Self {
            pos: [buf[0], buf[1], buf[2], buf[3]],
            unused: buf[4],
        }
    }
}

/// An index file opened for appending. Tracks its length so a failed
/// append can be cut back off.
#[derive(Debug)]
struct IndexStream {
    path: PathBuf,
    file: Budgeted<File>,
    len: u64,
}

impl IndexStream {
    fn open(path: PathBuf, budget: &SpaceBudget) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| QwkError::io(&path, e))?;
        let len = file
            .metadata()
            .map_err(|e| QwkError::io(&path, e))?
            .len();
        debug!(path = %path.display(), "Opened index");
        Ok(Self {
            path,
            file: Budgeted::new(file, budget.clone()),
            len,
        })
    }

    fn append(&mut self, entry: &IndexEntry) -> Result<()> {
        if let Err(e) = self.file.write_all(&entry.to_bytes()) {
            self.truncate(self.len);
            return Err(QwkError::write(&self.path, e));
        }
        self.len += INDEX_ENTRY_SIZE as u64;
        Ok(())
    }

    fn truncate(&mut self, len: u64) {
        match self.file.set_len(len) {
            Ok(()) => self.len = len,
            Err(e) => warn!(path = %self.path.display(), error = %e, "Could not truncate index"),
        }
    }
}

/// Writes index entries for one export session.
///
/// Per-area streams are opened lazily, so an area that contributes no
/// messages never gets an `.NDX` file. Only one area stream is open at a
/// time; appending for a different area closes the previous one.
#[derive(Debug)]
pub struct IndexWriter {
    dir: PathBuf,
    budget: SpaceBudget,
    area: Option<(u16, IndexStream)>,
    personal: Option<IndexStream>,
    zero: Option<IndexStream>,
}

impl IndexWriter {
    /// Create a writer that places its files in `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::with_budget(dir, SpaceBudget::unlimited())
    }

    /// Like [`new`](IndexWriter::new), with every stream charged against
    /// `budget`.
    pub fn with_budget(dir: impl AsRef<Path>, budget: SpaceBudget) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            budget,
            area: None,
            personal: None,
            zero: None,
        }
    }

    /// The area whose index is currently open, if any.
    pub fn current_area(&self) -> Option<u16> {
        self.area.as_ref().map(|(n, _)| *n)
    }

    /// Append an entry to the index of `area_number`, switching streams
    /// when the area changed since the last call.
    pub fn append_area(&mut self, area_number: u16, entry: &IndexEntry) -> Result<()> {
        if self.current_area() != Some(area_number) {
            self.area = None;
            let path = self.dir.join(area_index_name(area_number));
            self.area = Some((area_number, IndexStream::open(path, &self.budget)?));
        }
        match self.area.as_mut() {
            Some((_, stream)) => stream.append(entry),
            None => Ok(()),
        }
    }

    /// Open the two mailbox indices.
    pub fn open_mail(&mut self) -> Result<()> {
        if self.personal.is_none() {
            self.personal = Some(IndexStream::open(self.dir.join(PERSONAL_INDEX), &self.budget)?);
        }
        if self.zero.is_none() {
            self.zero = Some(IndexStream::open(self.dir.join(MAILBOX_INDEX), &self.budget)?);
        }
        Ok(())
    }

    /// Append the same entry to both mailbox indices. Either both get the
    /// entry or neither does.
    pub fn append_mail(&mut self, entry: &IndexEntry) -> Result<()> {
        let (Some(zero), Some(personal)) = (self.zero.as_mut(), self.personal.as_mut()) else {
            return Err(QwkError::InvalidRecord(
                "mail index written before open_mail".into(),
            ));
        };
        let zero_len = zero.len;
        zero.append(entry)?;
        if let Err(e) = personal.append(entry) {
            zero.truncate(zero_len);
            return Err(e);
        }
        Ok(())
    }

    /// Close the mailbox indices.
    pub fn close_mail(&mut self) {
        self.personal = None;
        self.zero = None;
    }

    /// Close every open stream.
    pub fn close(&mut self) {
        self.area = None;
        self.close_mail();
    }
}

/// Read all entries of an index file.
pub fn read_index(path: &Path) -> Result<Vec<IndexEntry>> {
    let data = std::fs::read(path).map_err(|e| QwkError::io(path, e))?;
    if data.len() % INDEX_ENTRY_SIZE != 0 {
        return Err(QwkError::InvalidRecord(format!(
            "{} is {} bytes, not a multiple of {INDEX_ENTRY_SIZE}",
            path.display(),
            data.len()
        )));
    }
    Ok(data
        .chunks_exact(INDEX_ENTRY_SIZE)
        .map(|c| IndexEntry::from_bytes(&[c[0], c[1], c[2], c[3], c[4]]))
        .collect())
}
