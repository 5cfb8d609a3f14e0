//! Last steps of an export: bulletins, archiving and delivery.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::SystemConfig;
use crate::error::{QwkError, Result};
use crate::session::{AbortFlag, Archiver, Prompt, Transport};

/// Remove every file below `dir`, creating it when missing.
pub fn clear_directory(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| QwkError::io(dir, e))?;
        return Ok(());
    }
    let entries = std::fs::read_dir(dir).map_err(|e| QwkError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| QwkError::io(dir, e))?.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path).map_err(|e| QwkError::io(&path, e))?;
        } else {
            std::fs::remove_file(&path).map_err(|e| QwkError::io(&path, e))?;
        }
    }
    debug!(dir = %dir.display(), "Cleared work directory");
    Ok(())
}

/// Copy the hello, news and bye files and any bulletins into the packet.
///
/// Missing source files are skipped with a warning. Returns the files
/// that were copied.
pub fn copy_bulletins(system: &SystemConfig, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut sources: Vec<(String, PathBuf)> = Vec::new();
    if let Some(text_dir) = &system.text_dir {
        for name in [&system.hello, &system.news, &system.bye] {
            if !name.is_empty() {
                sources.push((name.clone(), text_dir.join(name)));
            }
        }
    }
    for bulletin in &system.bulletins {
        sources.push((bulletin.name.clone(), bulletin.path.clone()));
    }

    let mut copied = Vec::new();
    for (name, source) in sources {
        if !source.is_file() {
            warn!(path = %source.display(), "Bulletin not found, skipping");
            continue;
        }
        let dest = dir.join(&name);
        std::fs::copy(&source, &dest).map_err(|e| QwkError::write(&dest, e))?;
        copied.push(dest);
    }
    info!(count = copied.len(), "Copied bulletins");
    Ok(copied)
}

/// Archive `dir` into `archive_path` and check the result.
///
/// Returns the archive size. A missing or empty archive is an error.
pub fn archive_packet(archiver: &dyn Archiver, dir: &Path, archive_path: &Path) -> Result<u64> {
    if archive_path.exists() {
        std::fs::remove_file(archive_path).map_err(|e| QwkError::io(archive_path, e))?;
    }
    archiver.archive(dir, archive_path)?;

    let size = match std::fs::metadata(archive_path) {
        Ok(meta) => meta.len(),
        Err(_) => {
            return Err(QwkError::Archive(format!(
                "archiver did not create {}",
                archive_path.display()
            )))
        }
    };
    if size == 0 {
        return Err(QwkError::Archive(format!(
            "{} is empty",
            archive_path.display()
        )));
    }
    info!(path = %archive_path.display(), size, "Packet archived");
    Ok(size)
}

/// Hand the archive to the transport, asking whether to retry after
/// every failed attempt. Returns whether it was delivered.
pub fn deliver(
    transport: &mut dyn Transport,
    prompt: &mut dyn Prompt,
    abort: &AbortFlag,
    archive_path: &Path,
) -> Result<bool> {
    loop {
        if abort.is_set() {
            return Ok(false);
        }
        let sent = match transport.send(archive_path) {
            Ok(sent) => sent,
            Err(e) => {
                warn!(error = %e, "Packet transfer failed");
                false
            }
        };
        if sent {
            info!(path = %archive_path.display(), "Packet delivered");
            return Ok(true);
        }
        if !prompt.retry_transfer() {
            return Ok(false);
        }
    }
}
