//! Collaborators and fixtures shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use qwkpack::config::Config;
use qwkpack::error::{QwkError, Result};
use qwkpack::session::{AddressPick, Archiver, Prompt, Transport};
use qwkpack::store::{parse_seed, LocalBoard};

pub const USER: &str = "John Doe";

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// The fixture board opened for [`USER`].
pub fn board() -> LocalBoard {
    let text = std::fs::read_to_string(fixture("board.toml")).unwrap();
    LocalBoard::new(parse_seed(&text).unwrap(), USER)
}

pub fn config() -> Config {
    let mut config = Config::default();
    config.system.name = "Night Owl BBS".into();
    config.system.sysop = "Sysop".into();
    config.user.name = USER.into();
    config
}

/// Export: writes the packet's file list as the "archive".
/// Import: treats the archive as the bare `.MSG` file.
#[derive(Default)]
pub struct FakeArchiver {
    pub fail: bool,
}

impl Archiver for FakeArchiver {
    fn archive(&self, dir: &Path, archive_path: &Path) -> Result<()> {
        if self.fail {
            return Err(QwkError::Archive("archiver exploded".into()));
        }
        let mut names: Vec<String> = std::fs::read_dir(dir)?
            .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<std::io::Result<_>>()?;
        names.sort();
        std::fs::write(archive_path, names.join("\n"))?;
        Ok(())
    }

    fn extract(&self, archive: &Path, pattern: &str, dest_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dest_dir)?;
        let dest = dest_dir.join(pattern);
        std::fs::copy(archive, &dest)?;
        Ok(dest)
    }
}

/// Records what it sends. Fails the first `failures` attempts.
#[derive(Default)]
pub struct FakeTransport {
    pub failures: u32,
    pub sent: Vec<PathBuf>,
    pub inbox: Option<PathBuf>,
}

impl Transport for FakeTransport {
    fn send(&mut self, path: &Path) -> Result<bool> {
        if self.failures > 0 {
            self.failures -= 1;
            return Ok(false);
        }
        self.sent.push(path.to_path_buf());
        Ok(true)
    }

    fn receive(&mut self, dest_dir: &Path, file_name: &str) -> Result<Option<PathBuf>> {
        let Some(source) = &self.inbox else {
            return Ok(None);
        };
        std::fs::create_dir_all(dest_dir)?;
        let dest = dest_dir.join(file_name);
        std::fs::copy(source, &dest)?;
        Ok(Some(dest))
    }
}

/// Fixed answers, with a log of the questions asked.
pub struct ScriptedPrompt {
    pub keep_partial: bool,
    pub private_to_mailbox: bool,
    pub address: AddressPick,
    pub retries: u32,
    pub redirects: VecDeque<u16>,
    pub asked: Vec<String>,
}

impl Default for ScriptedPrompt {
    fn default() -> Self {
        Self {
            keep_partial: true,
            private_to_mailbox: true,
            address: AddressPick::Record,
            retries: 0,
            redirects: VecDeque::new(),
            asked: Vec::new(),
        }
    }
}

impl Prompt for ScriptedPrompt {
    fn keep_partial(&mut self) -> bool {
        self.asked.push("keep_partial".into());
        self.keep_partial
    }

    fn route_private_to_mailbox(&mut self, title: &str, _to: &str, area: u16) -> bool {
        self.asked.push(format!("private:{title}:{area}"));
        self.private_to_mailbox
    }

    fn choose_address(&mut self, record_to: &str, embedded: &str) -> AddressPick {
        self.asked.push(format!("address:{record_to}:{embedded}"));
        self.address
    }

    fn retry_transfer(&mut self) -> bool {
        self.asked.push("retry".into());
        if self.retries > 0 {
            self.retries -= 1;
            true
        } else {
            false
        }
    }

    fn redirect_post(&mut self, title: &str, area: u16) -> Option<u16> {
        self.asked.push(format!("redirect:{title}:{area}"));
        self.redirects.pop_front()
    }
}
