//! Packet transfer through a shared directory.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{QwkError, Result};
use crate::session::Transport;

/// Drops finished packets into a directory and picks uploaded replies
/// up from the same place.
#[derive(Debug, Clone)]
pub struct LocalDirectory {
    dir: PathBuf,
}

impl LocalDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Locate `name` in the transfer directory, ignoring ASCII case.
    fn find(&self, name: &str) -> Option<PathBuf> {
        std::fs::read_dir(&self.dir)
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .find(|p| {
                p.is_file()
                    && p.file_name()
                        .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case(name))
            })
    }
}

impl Transport for LocalDirectory {
    fn send(&mut self, path: &Path) -> Result<bool> {
        let Some(name) = path.file_name() else {
            return Err(QwkError::Transport(format!(
                "{} is not a file",
                path.display()
            )));
        };
        std::fs::create_dir_all(&self.dir).map_err(|e| QwkError::io(&self.dir, e))?;
        let dest = self.dir.join(name);
        std::fs::copy(path, &dest).map_err(|e| QwkError::write(&dest, e))?;
        info!(path = %dest.display(), "Packet sent");
        Ok(true)
    }

    fn receive(&mut self, dest_dir: &Path, file_name: &str) -> Result<Option<PathBuf>> {
        let Some(found) = self.find(file_name) else {
            debug!(dir = %self.dir.display(), file_name, "Nothing to receive");
            return Ok(None);
        };
        std::fs::create_dir_all(dest_dir).map_err(|e| QwkError::io(dest_dir, e))?;
        let dest = dest_dir.join(file_name);
        std::fs::copy(&found, &dest).map_err(|e| QwkError::write(&dest, e))?;
        info!(path = %found.display(), "Reply packet received");
        Ok(Some(dest))
    }
}
