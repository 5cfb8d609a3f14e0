//! The export session: `Init → ScanMail → ScanAreas → Finalize`.
//!
//! A [`PacketBuilder`] owns one packet for its whole life. Messages are
//! appended to `MESSAGES.DAT` one at a time and each gets its index entry
//! right after; a failed write is cut back off so the files only ever hold
//! whole messages.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::config::{Config, SystemConfig};
use crate::error::{QwkError, Result, StoreError};
use crate::export::encoder::{self, EncodeInput, EncodedMessage};
use crate::export::{finish, AreaReport, ExportOutcome, ExportReport, ExportSettings, ScanStop};
use crate::format::record::{
    self, RECORD_SIZE, STATUS_PRIVATE, STATUS_PRIVATE_READ, STATUS_PUBLIC, STATUS_PUBLIC_READ,
};
use crate::format::space::{Budgeted, SpaceBudget};
use crate::format::{self as qwk, IndexEntry, IndexWriter, Manifest, MESSAGES_FILE};
use crate::model::{AreaInfo, Destination, UserProfile};
use crate::session::ExportContext;
use crate::text::{self, TextOptions};

/// How often the backward scan for the first unread post polls the abort
/// flag.
const SCAN_POLL_INTERVAL: u32 = 1000;

/// Builds and delivers one QWK packet.
pub struct PacketBuilder<'a> {
    ctx: ExportContext<'a>,
    system: &'a SystemConfig,
    user: &'a UserProfile,
    settings: ExportSettings,
    text: TextOptions,
    work_dir: PathBuf,
    packet_name: String,
    generated: NaiveDateTime,
    budget: SpaceBudget,
    progress: Option<&'a dyn Fn(&str, u32)>,
}

/// The files of a packet under construction.
struct Packet {
    path: PathBuf,
    messages: Budgeted<File>,
    /// Length of `MESSAGES.DAT` up to the last whole message.
    committed: u64,
    indices: IndexWriter,
    /// Number the next message gets; also the `CONTROL.DAT` counter.
    logical: u32,
    /// Record position of the next message's header.
    next_pos: u32,
}

enum IndexTarget {
    Area(u16),
    Mail,
}

impl Packet {
    fn create(dir: &Path, budget: &SpaceBudget) -> Result<Self> {
        let path = dir.join(MESSAGES_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| QwkError::io(&path, e))?;
        let mut messages = Budgeted::new(file, budget.clone());
        messages
            .write_all(&record::signature_record())
            .map_err(|e| QwkError::write(&path, e))?;
        Ok(Self {
            path,
            messages,
            committed: RECORD_SIZE as u64,
            indices: IndexWriter::with_budget(dir, budget.clone()),
            logical: 1,
            next_pos: 2,
        })
    }

    fn messages_written(&self) -> u32 {
        self.logical - 1
    }

    fn append(&mut self, msg: &EncodedMessage, target: IndexTarget) -> Result<()> {
        let entry = IndexEntry::for_position(self.next_pos)?;
        let bytes = msg.to_bytes();

        if let Err(e) = self.messages.write_all(&bytes) {
            self.rollback();
            return Err(QwkError::write(&self.path, e));
        }
        let indexed = match target {
            IndexTarget::Area(n) => self.indices.append_area(n, &entry),
            IndexTarget::Mail => self.indices.append_mail(&entry),
        };
        if let Err(e) = indexed {
            self.rollback();
            return Err(e);
        }

        self.committed += bytes.len() as u64;
        self.next_pos += msg.amount_blocks() as u32;
        self.logical += 1;
        Ok(())
    }

    fn rollback(&mut self) {
        if let Err(e) = self.messages.set_len(self.committed) {
            warn!(error = %e, "Could not truncate MESSAGES.DAT");
        }
        if let Err(e) = self.messages.seek(SeekFrom::Start(self.committed)) {
            warn!(error = %e, "Could not rewind MESSAGES.DAT");
        }
    }

    fn close(&mut self) {
        self.indices.close();
        if let Err(e) = self.messages.flush() {
            warn!(error = %e, "Could not flush MESSAGES.DAT");
        }
    }
}

/// Progress of the scan phases.
#[derive(Default)]
struct ScanState {
    stop: Option<ScanStop>,
    mail: u32,
    mail_ids: Vec<u64>,
    areas: Vec<AreaReport>,
    disk_exhausted: bool,
}

impl<'a> PacketBuilder<'a> {
    /// Create a builder. The packet is assembled in `work_dir/qwk` and
    /// archived to `work_dir/<NAME>.QWK`.
    pub fn new(ctx: ExportContext<'a>, config: &'a Config, work_dir: impl Into<PathBuf>) -> Self {
        let user = &config.user;
        Self {
            ctx,
            system: &config.system,
            user,
            settings: ExportSettings::from_config(config),
            text: TextOptions {
                color: user.color,
                keep_routing: user.keep_routing,
                palette: config.colors.palette,
            },
            work_dir: work_dir.into(),
            packet_name: qwk::packet_name(config.system.packet_name.as_deref(), &config.system.name),
            generated: chrono::Local::now().naive_local(),
            budget: SpaceBudget::unlimited(),
            progress: None,
        }
    }

    pub fn with_settings(mut self, settings: ExportSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Fix the generation time written to `CONTROL.DAT`.
    pub fn with_timestamp(mut self, generated: NaiveDateTime) -> Self {
        self.generated = generated;
        self
    }

    /// Cap the bytes the packet files may take in the work directory.
    /// Running out behaves like a full disk.
    pub fn with_space_budget(mut self, budget: SpaceBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Called after every exported message with the area name (or
    /// `E-Mail`) and the number of messages so far.
    pub fn with_progress(mut self, progress: &'a dyn Fn(&str, u32)) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn packet_name(&self) -> &str {
        &self.packet_name
    }

    /// Directory the packet files are written to.
    pub fn packet_dir(&self) -> PathBuf {
        self.work_dir.join("qwk")
    }

    /// Path of the finished archive.
    pub fn archive_path(&self) -> PathBuf {
        self.work_dir.join(qwk::packet_archive_file(&self.packet_name))
    }

    /// Run the whole session.
    pub fn run(mut self) -> Result<ExportReport> {
        let included: Vec<(u16, AreaInfo)> = self
            .ctx
            .board
            .areas()
            .into_iter()
            .enumerate()
            .filter(|(_, area)| area.include_in_scan)
            .map(|(i, area)| ((i + 1) as u16, area))
            .collect();
        let saved: Vec<(u16, u32)> = included
            .iter()
            .map(|(n, _)| (*n, self.ctx.board.last_read(*n)))
            .collect();

        let dir = self.packet_dir();
        finish::clear_directory(&dir)?;
        let mut packet = Packet::create(&dir, &self.budget)?;
        info!(
            packet = %self.packet_name,
            user = %self.user.name,
            areas = included.len(),
            "Building packet"
        );

        let mut state = ScanState::default();
        let scanned = self.scan(&mut packet, &included, &mut state);
        packet.close();

        if let Err(e) = scanned {
            if e.is_disk_exhausted() {
                warn!(error = %e, "Out of disk space, stopping scan");
                state.disk_exhausted = true;
                state.stop = Some(ScanStop::Aborted);
                self.ctx.abort.set();
            } else {
                self.restore_pointers(&saved);
                return Err(e);
            }
        }

        self.finalize(&packet, &included, &saved, state)
    }

    fn scan(
        &mut self,
        packet: &mut Packet,
        included: &[(u16, AreaInfo)],
        state: &mut ScanState,
    ) -> Result<()> {
        if self.user.scan_mail {
            self.scan_mail(packet, state)?;
        }
        for (number, area) in included {
            if state.stop.is_some() {
                break;
            }
            if self.ctx.abort.is_set() {
                state.stop = Some(ScanStop::Aborted);
                break;
            }
            match self.ctx.board.open_area(*number) {
                Ok(()) => {}
                Err(StoreError::Busy(reason)) => {
                    warn!(area = number, %reason, "Area busy, skipping");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            let result = self.scan_area(packet, *number, area, state);
            self.ctx.board.close_area(*number);
            result?;
        }
        Ok(())
    }

    /// Packet-wide quota check, recording the stop when reached.
    fn should_stop(&self, packet: &Packet, state: &mut ScanState) -> bool {
        if self.ctx.abort.is_set() {
            state.stop = Some(ScanStop::Aborted);
            return true;
        }
        if self.settings.max_total > 0 && packet.messages_written() >= self.settings.max_total {
            info!(max = self.settings.max_total, "Packet limit reached");
            state.stop = Some(ScanStop::Quota);
            return true;
        }
        false
    }

    fn scan_mail(&mut self, packet: &mut Packet, state: &mut ScanState) -> Result<()> {
        let mut items: Vec<(u32, _)> = self
            .ctx
            .board
            .messages_for_user(&self.user.name)?
            .into_iter()
            .enumerate()
            .map(|(i, item)| (i as u32 + 1, item))
            .collect();
        if items.is_empty() {
            debug!(user = %self.user.name, "No mail waiting");
            return Ok(());
        }
        if self.user.mail_newest_first {
            items.reverse();
        }

        packet.indices.open_mail()?;
        let to = self.user.name.to_uppercase();
        for (position, item) in &items {
            if self.should_stop(packet, state) {
                break;
            }
            let title = text::strip_colors_str(&item.title).to_uppercase();
            let origin = item.origin_system.as_deref().or(self.system.origin.as_deref());
            let stamp = text::address_stamp(&item.from, origin);
            let msg = encoder::encode(
                &EncodeInput {
                    body: &item.body,
                    from: &item.from,
                    to: &to,
                    title: &title,
                    posted: item.sent,
                    status: if item.read {
                        STATUS_PRIVATE_READ
                    } else {
                        STATUS_PRIVATE
                    },
                    destination: Destination::Mailbox,
                    msgnum: *position,
                    logical_num: packet.logical,
                    stamp: &stamp,
                },
                &self.text,
            )?;
            packet.append(&msg, IndexTarget::Mail)?;
            state.mail += 1;
            state.mail_ids.push(item.id);
            self.report_progress("E-Mail", packet);
        }
        packet.indices.close_mail();
        info!(count = state.mail, "Mail exported");
        Ok(())
    }

    fn scan_area(
        &mut self,
        packet: &mut Packet,
        number: u16,
        area: &AreaInfo,
        state: &mut ScanState,
    ) -> Result<()> {
        let total = self.ctx.board.message_count(number);
        let pointer = self.ctx.board.last_read(number);
        let mut report = AreaReport {
            number,
            name: text::strip_colors_str(&area.name),
            total,
            exported: 0,
            truncated: false,
        };

        let start = match self.settings.percent {
            Some(percent) => percent_start(total, percent),
            None => self.first_unread(number, total, pointer),
        };
        if self.ctx.abort.is_set() {
            state.stop = Some(ScanStop::Aborted);
        }

        if let (Some(start), None) = (start, state.stop) {
            let mut newest = pointer;
            for index in start..=total {
                if self.should_stop(packet, state) {
                    break;
                }
                if self.settings.max_per_area > 0 && report.exported >= self.settings.max_per_area
                {
                    report.truncated = true;
                    break;
                }

                let post = self.ctx.board.read_post(number, index)?;
                if post.is_hidden() && !self.user.privileged {
                    debug!(area = number, index, "Skipping hidden post");
                    continue;
                }

                let to = post.to.as_deref().filter(|t| !t.trim().is_empty()).unwrap_or("ALL");
                let origin = post.origin_system.as_deref().or(self.system.origin.as_deref());
                let stamp = text::address_stamp(&post.from, origin);
                let msg = encoder::encode(
                    &EncodeInput {
                        body: &post.body,
                        from: &post.from,
                        to,
                        title: &post.title,
                        posted: post.posted,
                        status: if post.sequence <= pointer {
                            STATUS_PUBLIC_READ
                        } else {
                            STATUS_PUBLIC
                        },
                        destination: Destination::Area(number),
                        msgnum: index,
                        logical_num: packet.logical,
                        stamp: &stamp,
                    },
                    &self.text,
                )?;
                packet.append(&msg, IndexTarget::Area(number))?;
                report.exported += 1;

                if post.sequence > newest {
                    newest = post.sequence;
                    self.ctx.board.set_last_read(number, newest);
                }
                self.report_progress(&report.name, packet);
            }
        }

        info!(
            area = number,
            name = %report.name,
            total = report.total,
            exported = report.exported,
            "Area scanned"
        );
        state.areas.push(report);
        Ok(())
    }

    /// Index of the oldest post newer than `pointer`, found by walking back
    /// from the newest post.
    fn first_unread(&self, number: u16, total: u32, pointer: u32) -> Option<u32> {
        if total == 0 {
            return None;
        }
        let board = &self.ctx.board;
        let mut index = total;
        let mut steps = 0u32;
        while index > 1 {
            match board.post_sequence(number, index - 1) {
                Some(seq) if seq > pointer => index -= 1,
                _ => break,
            }
            steps += 1;
            if steps % SCAN_POLL_INTERVAL == 0 && self.ctx.abort.is_set() {
                return None;
            }
        }
        match board.post_sequence(number, index) {
            Some(seq) if seq > pointer => Some(index),
            _ => None,
        }
    }

    fn report_progress(&self, label: &str, packet: &Packet) {
        if let Some(progress) = self.progress {
            progress(label, packet.messages_written());
        }
    }

    fn restore_pointers(&mut self, saved: &[(u16, u32)]) {
        for (number, pointer) in saved {
            self.ctx.board.set_last_read(*number, *pointer);
        }
        debug!(areas = saved.len(), "Read pointers restored");
    }

    fn finalize(
        &mut self,
        packet: &Packet,
        included: &[(u16, AreaInfo)],
        saved: &[(u16, u32)],
        state: ScanState,
    ) -> Result<ExportReport> {
        let dir = self.packet_dir();
        let mut report = ExportReport {
            outcome: ExportOutcome::Done,
            stop: state.stop.unwrap_or(ScanStop::Completed),
            packet_name: self.packet_name.clone(),
            packet_path: None,
            packet_size: 0,
            mail: state.mail,
            messages: packet.messages_written(),
            areas: state.areas,
            disk_exhausted: state.disk_exhausted,
        };

        if self.ctx.abort.is_set() && self.discard_partial(&dir, saved, &mut report)? {
            return Ok(report);
        }

        // Past this point the pointers only stay advanced for a delivered
        // packet. A disk that fills up while finishing gets one more try if
        // the user keeps the packet.
        let archive_path = self.archive_path();
        let mut retried = false;
        let size = loop {
            match self.assemble(packet, included, &dir, &archive_path) {
                Ok(size) => break size,
                Err(e) if e.is_disk_exhausted() && !retried => {
                    warn!(error = %e, "Out of disk space while finishing packet");
                    retried = true;
                    report.disk_exhausted = true;
                    self.ctx.abort.set();
                    if self.discard_partial(&dir, saved, &mut report)? {
                        return Ok(report);
                    }
                }
                Err(e) => {
                    self.restore_pointers(saved);
                    return Err(e);
                }
            }
        };
        report.packet_size = size;

        let delivered = match finish::deliver(
            &mut *self.ctx.transport,
            &mut *self.ctx.prompt,
            &self.ctx.abort,
            &archive_path,
        ) {
            Ok(delivered) => delivered,
            Err(e) => {
                self.restore_pointers(saved);
                return Err(e);
            }
        };
        if !delivered {
            warn!("Packet was not delivered");
            self.restore_pointers(saved);
            report.outcome = ExportOutcome::Undelivered;
            return Ok(report);
        }
        report.packet_path = Some(archive_path);

        if !self.user.update_read_pointers {
            self.restore_pointers(saved);
        }
        if self.user.delete_mail_after_download && !state.mail_ids.is_empty() {
            self.ctx.board.remove_messages(&state.mail_ids)?;
            info!(count = state.mail_ids.len(), "Downloaded mail removed");
        }

        info!(
            packet = %self.packet_name,
            messages = report.messages,
            size,
            "Packet complete"
        );
        Ok(report)
    }

    /// Offer to keep an aborted packet. Returns `true` when it was
    /// discarded; the read pointers are then back where they started.
    fn discard_partial(
        &mut self,
        dir: &Path,
        saved: &[(u16, u32)],
        report: &mut ExportReport,
    ) -> Result<bool> {
        report.stop = ScanStop::Aborted;
        if self.ctx.prompt.keep_partial() {
            info!(messages = report.messages, "Keeping partial packet");
            self.ctx.abort.clear();
            return Ok(false);
        }
        info!("Partial packet discarded");
        self.restore_pointers(saved);
        finish::clear_directory(dir)?;
        report.outcome = ExportOutcome::Discarded;
        Ok(true)
    }

    /// Write the manifest, add bulletins and archive. Returns the archive
    /// size.
    fn assemble(
        &self,
        packet: &Packet,
        included: &[(u16, AreaInfo)],
        dir: &Path,
        archive_path: &Path,
    ) -> Result<u64> {
        let manifest = Manifest {
            packet_name: self.packet_name.clone(),
            phone: self.system.phone.clone(),
            sysop: self.system.sysop.clone(),
            generated: self.generated,
            user_name: self.user.name.clone(),
            record_counter: packet.logical,
            areas: included
                .iter()
                .map(|(n, area)| (*n, text::strip_colors_str(&area.name)))
                .collect(),
            hello: self.system.hello.clone(),
            news: self.system.news.clone(),
            bye: self.system.bye.clone(),
        };
        manifest.write_within(dir, &self.budget)?;

        if self.user.include_bulletins {
            finish::copy_bulletins(self.system, dir)?;
        }
        finish::archive_packet(self.ctx.archiver, dir, archive_path)
    }
}

/// First index of the newest `percent`% of `total` posts.
fn percent_start(total: u32, percent: u8) -> Option<u32> {
    let take = (u64::from(total) * u64::from(percent.min(100)) / 100) as u32;
    if take == 0 {
        None
    } else {
        Some(total - take + 1)
    }
}
