//! File-backed board: areas, posts, mail and read pointers in one file.
//!
//! The whole board is loaded into memory, changed through the
//! [`MessageStore`] and [`Mailbox`] traits and written back with
//! [`LocalBoard::save`].

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{QwkError, Result, StoreError};
use crate::model::{AreaInfo, MailItem, OutgoingMail, OutgoingPost, StoredPost};
use crate::session::{Mailbox, MessageStore};
use crate::store::format::{BoardHeader, HEADER_SIZE, MAGIC, VERSION};

/// One public area with its posts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardArea {
    pub name: String,
    /// Included in packets unless the user says otherwise.
    pub scan: bool,
    /// Nobody may post here.
    pub read_only: bool,
    /// Oldest first; sequences are strictly increasing.
    pub posts: Vec<StoredPost>,
}

impl BoardArea {
    fn next_sequence(&self) -> u32 {
        self.posts.last().map_or(1, |p| p.sequence + 1)
    }
}

/// Everything stored in a board file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardData {
    pub areas: Vec<BoardArea>,
    /// Known user names, upper case. Position plus one is the user number.
    pub users: Vec<String>,
    pub mail: Vec<MailItem>,
    pub next_mail_id: u64,
    /// User name to area name to the last read sequence.
    pub pointers: BTreeMap<String, BTreeMap<String, u32>>,
}

/// Read and validate a board file.
pub fn load_board(path: &Path) -> Result<BoardData> {
    let data = std::fs::read(path).map_err(|e| QwkError::io(path, e))?;
    let invalid = |reason: String| QwkError::InvalidBoard {
        path: path.to_path_buf(),
        reason,
    };

    if data.len() < HEADER_SIZE {
        return Err(invalid("file too small".into()));
    }

    let header: BoardHeader = bincode::deserialize(&data[..HEADER_SIZE])
        .map_err(|e| invalid(format!("Header deserialization failed: {e}")))?;
    header.validate().map_err(invalid)?;

    let payload = &data[HEADER_SIZE..];
    if payload.len() as u64 != header.payload_len {
        return Err(invalid(format!(
            "payload is {} bytes, header says {}",
            payload.len(),
            header.payload_len
        )));
    }
    let hash: [u8; 32] = Sha256::digest(payload).into();
    if hash != header.sha256_payload {
        return Err(invalid("payload checksum mismatch".into()));
    }

    bincode::deserialize(payload).map_err(|e| invalid(format!("Payload deserialization failed: {e}")))
}

/// Write a board file, replacing any existing one.
pub fn save_board(path: &Path, board: &BoardData) -> Result<()> {
    let invalid = |reason: String| QwkError::InvalidBoard {
        path: path.to_path_buf(),
        reason,
    };
    let payload = bincode::serialize(board).map_err(|e| invalid(e.to_string()))?;

    let header = BoardHeader {
        magic: *MAGIC,
        version: VERSION,
        flags: 0,
        payload_len: payload.len() as u64,
        sha256_payload: Sha256::digest(&payload).into(),
    };
    let header_bytes = bincode::serialize(&header).map_err(|e| invalid(e.to_string()))?;

    // Pad header to HEADER_SIZE
    let mut padded_header = vec![0u8; HEADER_SIZE];
    let copy_len = header_bytes.len().min(HEADER_SIZE);
    padded_header[..copy_len].copy_from_slice(&header_bytes[..copy_len]);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| QwkError::io(parent, e))?;
        }
    }
    let mut file = File::create(path).map_err(|e| QwkError::io(path, e))?;
    file.write_all(&padded_header)
        .map_err(|e| QwkError::write(path, e))?;
    file.write_all(&payload).map_err(|e| QwkError::write(path, e))?;
    file.flush().map_err(|e| QwkError::write(path, e))?;
    Ok(())
}

/// A board opened on behalf of one user.
pub struct LocalBoard {
    path: Option<PathBuf>,
    data: BoardData,
    /// Upper-cased name of the user the board was opened for.
    user: String,
    /// Areas currently inside an open/close scope.
    open: HashSet<u16>,
}

impl LocalBoard {
    /// Wrap in-memory board data. [`save`](LocalBoard::save) is a no-op.
    pub fn new(data: BoardData, user: &str) -> Self {
        Self {
            path: None,
            data,
            user: user.trim().to_uppercase(),
            open: HashSet::new(),
        }
    }

    /// Load the board file at `path` for `user`.
    pub fn open(path: impl AsRef<Path>, user: &str) -> Result<Self> {
        let path = path.as_ref();
        let data = load_board(path)?;
        info!(
            path = %path.display(),
            areas = data.areas.len(),
            mail = data.mail.len(),
            "Board loaded"
        );
        let mut board = Self::new(data, user);
        board.path = Some(path.to_path_buf());
        Ok(board)
    }

    pub fn data(&self) -> &BoardData {
        &self.data
    }

    pub fn into_data(self) -> BoardData {
        self.data
    }

    /// Write the board back to the file it was opened from.
    pub fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => {
                save_board(path, &self.data)?;
                debug!(path = %path.display(), "Board saved");
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn area(&self, area: u16) -> Option<&BoardArea> {
        usize::from(area)
            .checked_sub(1)
            .and_then(|i| self.data.areas.get(i))
    }

    fn area_mut(&mut self, area: u16) -> std::result::Result<&mut BoardArea, StoreError> {
        usize::from(area)
            .checked_sub(1)
            .and_then(|i| self.data.areas.get_mut(i))
            .ok_or_else(|| StoreError::NotFound(format!("area {area}")))
    }

    /// Resolve a normalized address to a known user name. A bare number is
    /// a user number. An empty user list accepts anyone.
    fn resolve_user(&self, to: &str) -> Option<String> {
        if let Ok(n) = to.parse::<usize>() {
            return n
                .checked_sub(1)
                .and_then(|i| self.data.users.get(i))
                .cloned();
        }
        let to = to.to_uppercase();
        if self.data.users.is_empty() || self.data.users.contains(&to) {
            Some(to)
        } else {
            None
        }
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl MessageStore for LocalBoard {
    fn areas(&self) -> Vec<AreaInfo> {
        self.data
            .areas
            .iter()
            .map(|a| AreaInfo {
                name: a.name.clone(),
                include_in_scan: a.scan,
            })
            .collect()
    }

    fn open_area(&mut self, area: u16) -> std::result::Result<(), StoreError> {
        if self.area(area).is_none() {
            return Err(StoreError::NotFound(format!("area {area}")));
        }
        if !self.open.insert(area) {
            return Err(StoreError::Busy(format!("area {area} is already open")));
        }
        Ok(())
    }

    fn close_area(&mut self, area: u16) {
        self.open.remove(&area);
    }

    fn message_count(&self, area: u16) -> u32 {
        self.area(area).map_or(0, |a| a.posts.len() as u32)
    }

    fn post_sequence(&self, area: u16, index: u32) -> Option<u32> {
        let i = (index as usize).checked_sub(1)?;
        self.area(area)?.posts.get(i).map(|p| p.sequence)
    }

    fn read_post(&self, area: u16, index: u32) -> std::result::Result<StoredPost, StoreError> {
        (index as usize)
            .checked_sub(1)
            .and_then(|i| self.area(area)?.posts.get(i))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("post {index} in area {area}")))
    }

    fn last_read(&self, area: u16) -> u32 {
        let Some(a) = self.area(area) else {
            return 0;
        };
        self.data
            .pointers
            .get(&self.user)
            .and_then(|p| p.get(&a.name))
            .copied()
            .unwrap_or(0)
    }

    fn set_last_read(&mut self, area: u16, sequence: u32) {
        let Some(name) = self.area(area).map(|a| a.name.clone()) else {
            return;
        };
        self.data
            .pointers
            .entry(self.user.clone())
            .or_default()
            .insert(name, sequence);
    }

    fn can_post(&self, area: u16) -> bool {
        self.area(area).is_some_and(|a| !a.read_only)
    }

    fn post(&mut self, area: u16, post: OutgoingPost) -> std::result::Result<(), StoreError> {
        let target = self.area_mut(area)?;
        if target.read_only {
            return Err(StoreError::Rejected(format!("{} is read-only", target.name)));
        }
        let sequence = target.next_sequence();
        target.posts.push(StoredPost {
            sequence,
            from: post.from,
            origin_system: None,
            to: Some(post.to),
            title: post.title,
            body: post.body,
            posted: now(),
            validated: true,
            deleted: false,
        });
        debug!(area, sequence, "Post stored");
        Ok(())
    }
}

impl Mailbox for LocalBoard {
    fn messages_for_user(&self, user: &str) -> std::result::Result<Vec<MailItem>, StoreError> {
        let mut mail: Vec<MailItem> = self
            .data
            .mail
            .iter()
            .filter(|m| m.to.eq_ignore_ascii_case(user.trim()))
            .cloned()
            .collect();
        mail.sort_by_key(|m| m.id);
        Ok(mail)
    }

    fn deliver(&mut self, mail: OutgoingMail) -> std::result::Result<(), StoreError> {
        let Some(to) = self.resolve_user(&mail.to) else {
            return Err(StoreError::Rejected(format!("unknown user {}", mail.to)));
        };
        self.data.next_mail_id += 1;
        let id = self.data.next_mail_id;
        self.data.mail.push(MailItem {
            id,
            from: mail.from,
            origin_system: None,
            to,
            title: mail.title,
            body: mail.body,
            sent: now(),
            read: false,
        });
        debug!(id, "Mail stored");
        Ok(())
    }

    fn remove_messages(&mut self, ids: &[u64]) -> std::result::Result<(), StoreError> {
        self.data.mail.retain(|m| !ids.contains(&m.id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BoardData {
        let post = |sequence| StoredPost {
            sequence,
            from: "SYSOP".into(),
            origin_system: None,
            to: None,
            title: format!("Post {sequence}"),
            body: b"Hello\r".to_vec(),
            posted: now(),
            validated: true,
            deleted: false,
        };
        BoardData {
            areas: vec![
                BoardArea {
                    name: "General".into(),
                    scan: true,
                    read_only: false,
                    posts: vec![post(3), post(8)],
                },
                BoardArea {
                    name: "News".into(),
                    scan: false,
                    read_only: true,
                    posts: Vec::new(),
                },
            ],
            users: vec!["SYSOP".into(), "JOHN DOE".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.qwkb");
        let data = sample();
        save_board(&path, &data).unwrap();
        assert_eq!(load_board(&path).unwrap(), data);
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.qwkb");
        save_board(&path, &sample()).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            load_board(&path),
            Err(QwkError::InvalidBoard { .. })
        ));
    }

    #[test]
    fn test_short_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.qwkb");
        std::fs::write(&path, b"QWKBOARD").unwrap();
        assert!(matches!(
            load_board(&path),
            Err(QwkError::InvalidBoard { .. })
        ));
    }

    #[test]
    fn test_posts_by_index() {
        let board = LocalBoard::new(sample(), "john doe");
        assert_eq!(board.message_count(1), 2);
        assert_eq!(board.post_sequence(1, 2), Some(8));
        assert_eq!(board.post_sequence(1, 3), None);
        assert_eq!(board.post_sequence(9, 1), None);
        assert!(matches!(board.read_post(1, 0), Err(StoreError::NotFound(_))));
        assert_eq!(board.read_post(1, 1).unwrap().title, "Post 3");
    }

    #[test]
    fn test_read_pointers_are_per_user() {
        let mut data = sample();
        {
            let mut board = LocalBoard::new(data.clone(), "John Doe");
            board.set_last_read(1, 8);
            assert_eq!(board.last_read(1), 8);
            data = board.into_data();
        }
        let board = LocalBoard::new(data, "SYSOP");
        assert_eq!(board.last_read(1), 0);
    }

    #[test]
    fn test_open_twice_is_busy() {
        let mut board = LocalBoard::new(sample(), "SYSOP");
        board.open_area(1).unwrap();
        assert!(matches!(board.open_area(1), Err(StoreError::Busy(_))));
        board.close_area(1);
        board.open_area(1).unwrap();
        assert!(matches!(board.open_area(5), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_post_appends_next_sequence() {
        let mut board = LocalBoard::new(sample(), "SYSOP");
        assert!(board.can_post(1));
        assert!(!board.can_post(2));
        board
            .post(
                1,
                OutgoingPost {
                    from: "SYSOP".into(),
                    to: "ALL".into(),
                    title: "Reply".into(),
                    body: b"Text".to_vec(),
                },
            )
            .unwrap();
        assert_eq!(board.post_sequence(1, 3), Some(9));

        let refused = board.post(
            2,
            OutgoingPost {
                from: "SYSOP".into(),
                to: "ALL".into(),
                title: "Nope".into(),
                body: b"Text".to_vec(),
            },
        );
        assert!(matches!(refused, Err(StoreError::Rejected(_))));
    }

    #[test]
    fn test_deliver_resolves_user_numbers() {
        let mut board = LocalBoard::new(sample(), "SYSOP");
        let mail = |to: &str| OutgoingMail {
            from: "SYSOP".into(),
            to: to.into(),
            title: "Hi".into(),
            body: b"Text".to_vec(),
        };
        board.deliver(mail("2")).unwrap();
        board.deliver(mail("john doe")).unwrap();
        assert!(matches!(
            board.deliver(mail("NOBODY")),
            Err(StoreError::Rejected(_))
        ));
        assert!(board.deliver(mail("9")).is_err());

        let inbox = board.messages_for_user("JOHN DOE").unwrap();
        assert_eq!(inbox.len(), 2);
        assert!(inbox[0].id < inbox[1].id);

        board.remove_messages(&[inbox[0].id]).unwrap();
        assert_eq!(board.messages_for_user("john doe").unwrap().len(), 1);
    }
}
