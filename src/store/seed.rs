//! Building a board file from a TOML description.
//!
//! ```toml
//! users = ["SYSOP", "JOHN DOE"]
//!
//! [[areas]]
//! name = "General"
//!
//! [[areas.posts]]
//! from = "SYSOP"
//! title = "Welcome"
//! body = "First line\nSecond line"
//! posted = "2024-03-01T09:30:00"
//!
//! [[mail]]
//! from = "SYSOP"
//! to = "JOHN DOE"
//! title = "Hello"
//! body = "Private text"
//! ```
//!
//! Newlines in bodies become the CR line endings the board stores.

use std::path::Path;

use chrono::{Local, NaiveDateTime};
use serde::Deserialize;
use tracing::info;

use crate::error::{QwkError, Result};
use crate::model::{MailItem, StoredPost};
use crate::store::local::{save_board, BoardArea, BoardData};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BoardSeed {
    #[serde(default)]
    users: Vec<String>,
    #[serde(default)]
    areas: Vec<AreaSeed>,
    #[serde(default)]
    mail: Vec<MailSeed>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AreaSeed {
    name: String,
    #[serde(default = "default_true")]
    scan: bool,
    #[serde(default)]
    read_only: bool,
    #[serde(default)]
    posts: Vec<PostSeed>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PostSeed {
    from: String,
    origin: Option<String>,
    to: Option<String>,
    title: String,
    body: String,
    posted: Option<NaiveDateTime>,
    /// Unvalidated: only privileged users get it.
    #[serde(default)]
    hidden: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MailSeed {
    from: String,
    origin: Option<String>,
    to: String,
    title: String,
    body: String,
    sent: Option<NaiveDateTime>,
    #[serde(default)]
    read: bool,
}

fn default_true() -> bool {
    true
}

/// Convert text line endings to bare CR.
fn board_text(body: &str) -> Vec<u8> {
    body.replace("\r\n", "\r").replace('\n', "\r").into_bytes()
}

/// Parse a TOML board description.
pub fn parse_seed(text: &str) -> std::result::Result<BoardData, toml::de::Error> {
    let seed: BoardSeed = toml::from_str(text)?;
    let now = Local::now().naive_local();

    let areas = seed
        .areas
        .into_iter()
        .map(|area| BoardArea {
            name: area.name,
            scan: area.scan,
            read_only: area.read_only,
            posts: area
                .posts
                .into_iter()
                .zip(1u32..)
                .map(|(post, sequence)| StoredPost {
                    sequence,
                    from: post.from,
                    origin_system: post.origin,
                    to: post.to,
                    title: post.title,
                    body: board_text(&post.body),
                    posted: post.posted.unwrap_or(now),
                    validated: !post.hidden,
                    deleted: false,
                })
                .collect(),
        })
        .collect();

    let mail: Vec<MailItem> = seed
        .mail
        .into_iter()
        .zip(1u64..)
        .map(|(m, id)| MailItem {
            id,
            from: m.from,
            origin_system: m.origin,
            to: m.to.trim().to_uppercase(),
            title: m.title,
            body: board_text(&m.body),
            sent: m.sent.unwrap_or(now),
            read: m.read,
        })
        .collect();

    Ok(BoardData {
        areas,
        users: seed.users.iter().map(|u| u.trim().to_uppercase()).collect(),
        next_mail_id: mail.len() as u64,
        mail,
        pointers: Default::default(),
    })
}

/// Read `seed_path` and write the resulting board to `board_path`.
pub fn seed_board(seed_path: &Path, board_path: &Path) -> Result<BoardData> {
    let text = std::fs::read_to_string(seed_path).map_err(|e| QwkError::io(seed_path, e))?;
    let board = parse_seed(&text).map_err(|e| QwkError::InvalidBoard {
        path: seed_path.to_path_buf(),
        reason: e.to_string(),
    })?;
    save_board(board_path, &board)?;
    info!(
        path = %board_path.display(),
        areas = board.areas.len(),
        mail = board.mail.len(),
        "Board seeded"
    );
    Ok(board)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = r#"
users = ["sysop", "John Doe"]

[[areas]]
name = "General"

[[areas.posts]]
from = "SYSOP"
title = "Welcome"
body = "One\nTwo"
posted = "2024-03-01T09:30:00"

[[areas.posts]]
from = "JOHN DOE"
to = "SYSOP"
title = "Pending"
body = "Hidden"
hidden = true

[[areas]]
name = "Announcements"
scan = false
read_only = true

[[mail]]
from = "SYSOP"
to = "john doe"
title = "Hello"
body = "Private"
read = true
"#;

    #[test]
    fn test_parse_seed() {
        let board = parse_seed(SEED).unwrap();
        assert_eq!(board.users, vec!["SYSOP", "JOHN DOE"]);
        assert_eq!(board.areas.len(), 2);

        let general = &board.areas[0];
        assert!(general.scan);
        assert_eq!(general.posts[0].sequence, 1);
        assert_eq!(general.posts[0].body, b"One\rTwo");
        assert_eq!(
            general.posts[0].posted.format("%Y-%m-%d %H:%M").to_string(),
            "2024-03-01 09:30"
        );
        assert_eq!(general.posts[1].sequence, 2);
        assert!(general.posts[1].is_hidden());

        assert!(!board.areas[1].scan);
        assert!(board.areas[1].read_only);

        assert_eq!(board.mail[0].to, "JOHN DOE");
        assert!(board.mail[0].read);
        assert_eq!(board.next_mail_id, 1);
    }

    #[test]
    fn test_unknown_key_is_an_error() {
        assert!(parse_seed("[[areas]]\nname = \"A\"\ncolour = 3\n").is_err());
    }

    #[test]
    fn test_seed_board_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("board.toml");
        let out = dir.path().join("data").join("board.qwkb");
        std::fs::write(&seed, SEED).unwrap();

        let board = seed_board(&seed, &out).unwrap();
        assert_eq!(crate::store::local::load_board(&out).unwrap(), board);
    }
}
