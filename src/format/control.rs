//! `CONTROL.DAT`: the packet manifest.
//!
//! A CRLF text file read positionally by offline readers, so line order is
//! part of the format:
//!
//! ```text
//! NAME.QWK             packet file name
//!                      city and state (blank)
//! phone                system phone
//! sysop                sysop name
//! 00000,NAME           system id and packet name
//! MM-DD-YYYY,HH:MM:SS  generation time
//! user                 user name
//!                      reserved
//! 0                    reserved
//! N                    record counter
//! A                    number of areas listed below
//! 0                    conference zero...
//! E-Mail               ...is the mailbox
//! n / name             one pair per area
//! hello / news / bye   bulletin file names
//! ```

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{QwkError, Result};
use crate::format::space::{Budgeted, SpaceBudget};

/// File name of the manifest inside a packet.
pub const CONTROL_FILE: &str = "CONTROL.DAT";

/// Timestamp format of line 6.
const TIMESTAMP_FORMAT: &str = "%m-%d-%Y,%H:%M:%S";

/// Label of conference zero.
const MAILBOX_LABEL: &str = "E-Mail";

/// Number of fixed lines before the area list.
const FIXED_LINES: usize = 13;

/// Contents of `CONTROL.DAT`.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    /// Packet name stem, e.g. `MYBBS`.
    pub packet_name: String,
    pub phone: String,
    pub sysop: String,
    pub generated: NaiveDateTime,
    pub user_name: String,
    /// Running record counter: messages written plus one.
    pub record_counter: u32,
    /// `(area number, area name)` for every area included in the scan.
    pub areas: Vec<(u16, String)>,
    pub hello: String,
    pub news: String,
    pub bye: String,
}

impl Manifest {
    /// The manifest as lines, in file order.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("{}.QWK", self.packet_name),
            String::new(),
            self.phone.clone(),
            self.sysop.clone(),
            format!("00000,{}", self.packet_name),
            self.generated.format(TIMESTAMP_FORMAT).to_string(),
            self.user_name.clone(),
            String::new(),
            "0".to_string(),
            self.record_counter.to_string(),
            self.areas.len().to_string(),
            "0".to_string(),
            MAILBOX_LABEL.to_string(),
        ];
        for (number, name) in &self.areas {
            lines.push(number.to_string());
            lines.push(name.clone());
        }
        lines.push(self.hello.clone());
        lines.push(self.news.clone());
        lines.push(self.bye.clone());
        lines
    }

    /// Render with CRLF line endings.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in self.lines() {
            out.push_str(&line);
            out.push_str("\r\n");
        }
        out
    }

    /// Write `CONTROL.DAT` into `dir`.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        self.write_within(dir, &SpaceBudget::unlimited())
    }

    /// [`write`](Manifest::write), charged against `budget`.
    pub fn write_within(&self, dir: &Path, budget: &SpaceBudget) -> Result<PathBuf> {
        let path = dir.join(CONTROL_FILE);
        let file = File::create(&path).map_err(|e| QwkError::io(&path, e))?;
        let mut out = Budgeted::new(file, budget.clone());
        out.write_all(self.render().as_bytes())
            .and_then(|()| out.flush())
            .map_err(|e| QwkError::write(&path, e))?;
        Ok(path)
    }

    /// Parse a manifest back from its text.
    pub fn parse(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .collect();
        let line = |i: usize| -> Result<&str> {
            lines
                .get(i)
                .copied()
                .ok_or_else(|| invalid(format!("missing line {}", i + 1)))
        };

        let first = line(0)?;
        let packet_name = first
            .strip_suffix(".QWK")
            .or_else(|| first.strip_suffix(".qwk"))
            .unwrap_or(first)
            .to_string();
        let generated = NaiveDateTime::parse_from_str(line(5)?, TIMESTAMP_FORMAT)
            .map_err(|e| invalid(format!("bad timestamp: {e}")))?;
        let record_counter = line(9)?
            .trim()
            .parse()
            .map_err(|_| invalid("bad record counter".into()))?;
        let area_count: usize = line(10)?
            .trim()
            .parse()
            .map_err(|_| invalid("bad area count".into()))?;

        let mut areas = Vec::with_capacity(area_count);
        for i in 0..area_count {
            let at = FIXED_LINES + i * 2;
            let number = line(at)?
                .trim()
                .parse()
                .map_err(|_| invalid(format!("bad area number on line {}", at + 1)))?;
            areas.push((number, line(at + 1)?.to_string()));
        }
        let tail = FIXED_LINES + area_count * 2;

        Ok(Self {
            packet_name,
            phone: line(2)?.to_string(),
            sysop: line(3)?.to_string(),
            generated,
            user_name: line(6)?.to_string(),
            record_counter,
            areas,
            hello: line(tail).unwrap_or_default().to_string(),
            news: line(tail + 1).unwrap_or_default().to_string(),
            bye: line(tail + 2).unwrap_or_default().to_string(),
        })
    }
}

fn invalid(reason: String) -> QwkError {
    QwkError::InvalidRecord(format!("{CONTROL_FILE}: {reason}"))
}
