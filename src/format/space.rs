//! Space accounting for the files of one packet.
//!
//! A [`SpaceBudget`] caps the bytes a packet may take in its work
//! directory. Writers wrapped in [`Budgeted`] draw from it and fail with
//! `StorageFull` once it is spent, the same way a full volume fails them.

use std::cell::Cell;
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::rc::Rc;

/// Bytes a packet may still write. Clones share the same pool.
#[derive(Debug, Clone, Default)]
pub struct SpaceBudget {
    remaining: Option<Rc<Cell<u64>>>,
}

impl SpaceBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn limited(bytes: u64) -> Self {
        Self {
            remaining: Some(Rc::new(Cell::new(bytes))),
        }
    }

    /// Bytes left, `None` when unlimited.
    pub fn remaining(&self) -> Option<u64> {
        self.remaining.as_ref().map(|c| c.get())
    }

    fn allow(&self, want: usize) -> usize {
        match &self.remaining {
            None => want,
            Some(c) => want.min(usize::try_from(c.get()).unwrap_or(usize::MAX)),
        }
    }

    fn spend(&self, n: u64) {
        if let Some(c) = &self.remaining {
            c.set(c.get().saturating_sub(n));
        }
    }

    fn refund(&self, n: u64) {
        if let Some(c) = &self.remaining {
            c.set(c.get().saturating_add(n));
        }
    }
}

/// A writer charged against a [`SpaceBudget`].
#[derive(Debug)]
pub struct Budgeted<W> {
    inner: W,
    budget: SpaceBudget,
}

impl<W> Budgeted<W> {
    pub fn new(inner: W, budget: SpaceBudget) -> Self {
        Self { inner, budget }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}

impl<W: Write> Write for Budgeted<W> {
    /// Writes what still fits. With nothing left, fails with
    /// `ErrorKind::StorageFull`.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let allowed = self.budget.allow(buf.len());
        if allowed == 0 {
            return Err(io::Error::new(
                io::ErrorKind::StorageFull,
                "packet space exhausted",
            ));
        }
        let n = self.inner.write(&buf[..allowed])?;
        self.budget.spend(n as u64);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Seek> Seek for Budgeted<W> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl Budgeted<File> {
    /// Resize the file. Space freed by truncation goes back to the budget.
    pub fn set_len(&mut self, len: u64) -> io::Result<()> {
        let before = self.inner.metadata()?.len();
        self.inner.set_len(len)?;
        if before > len {
            self.budget.refund(before - len);
        } else {
            self.budget.spend(len - before);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_writes_everything() {
        let mut w = Budgeted::new(Vec::new(), SpaceBudget::unlimited());
        w.write_all(&[7u8; 4096]).unwrap();
        assert_eq!(w.get_ref().len(), 4096);
    }

    #[test]
    fn test_limit_writes_what_fits_then_fails() {
        let budget = SpaceBudget::limited(10);
        let mut w = Budgeted::new(Vec::new(), budget.clone());
        let err = w.write_all(&[1u8; 16]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::StorageFull);
        assert_eq!(w.get_ref().len(), 10);
        assert_eq!(budget.remaining(), Some(0));
    }

    #[test]
    fn test_clones_share_the_pool() {
        let budget = SpaceBudget::limited(6);
        let mut a = Budgeted::new(Vec::new(), budget.clone());
        let mut b = Budgeted::new(Vec::new(), budget.clone());
        a.write_all(b"abcd").unwrap();
        assert!(b.write_all(b"efg").is_err());
        assert_eq!(b.get_ref(), b"ef");
    }

    #[test]
    fn test_truncation_refunds_space() {
        let tmp = tempfile::tempdir().unwrap();
        let file = File::create(tmp.path().join("x")).unwrap();
        let budget = SpaceBudget::limited(100);
        let mut w = Budgeted::new(file, budget.clone());
        w.write_all(&[0u8; 60]).unwrap();
        assert_eq!(budget.remaining(), Some(40));
        w.set_len(20).unwrap();
        assert_eq!(budget.remaining(), Some(80));
    }
}
