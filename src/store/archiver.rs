//! Archiving through an external program.
//!
//! Commands are templates split on whitespace. Placeholders:
//!
//! | placeholder | replaced with                                  |
//! |-------------|------------------------------------------------|
//! | `{archive}` | archive path                                   |
//! | `{files}`   | every file of the packet directory, one arg each |
//! | `{dir}`     | packet or destination directory                |
//! | `{pattern}` | name of the file to extract                    |

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use crate::config::ArchiveConfig;
use crate::error::{QwkError, Result};
use crate::session::Archiver;

/// Runs the configured archive and extract commands.
#[derive(Debug, Clone)]
pub struct CommandArchiver {
    archive_command: String,
    extract_command: String,
}

impl CommandArchiver {
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            archive_command: config.archive_command.clone(),
            extract_command: config.extract_command.clone(),
        }
    }
}

/// Expand a command template into program arguments.
fn expand(template: &str, vars: &[(&str, &str)], files: &[PathBuf]) -> Vec<String> {
    let mut args = Vec::new();
    for token in template.split_whitespace() {
        if token == "{files}" {
            args.extend(files.iter().map(|f| f.to_string_lossy().into_owned()));
            continue;
        }
        let mut arg = token.to_string();
        for (name, value) in vars {
            arg = arg.replace(name, value);
        }
        args.push(arg);
    }
    args
}

fn run(args: &[String]) -> Result<()> {
    let Some((program, rest)) = args.split_first() else {
        return Err(QwkError::Archive("empty archiver command".into()));
    };
    debug!(program, args = ?rest, "Running archiver");
    let output = Command::new(program)
        .args(rest)
        .output()
        .map_err(|e| QwkError::Archive(format!("cannot run {program}: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(program, status = %output.status, "Archiver failed");
        return Err(QwkError::Archive(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}

/// Files directly inside `dir`, sorted by name.
fn packet_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| QwkError::io(dir, e))? {
        let path = entry.map_err(|e| QwkError::io(dir, e))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Find `name` in `dir`, ignoring ASCII case.
fn find_file(dir: &Path, name: &str) -> Option<PathBuf> {
    let exact = dir.join(name);
    if exact.is_file() {
        return Some(exact);
    }
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| {
            p.is_file()
                && p.file_name()
                    .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case(name))
        })
}

impl Archiver for CommandArchiver {
    fn archive(&self, dir: &Path, archive_path: &Path) -> Result<()> {
        let files = packet_files(dir)?;
        if archive_path.exists() {
            std::fs::remove_file(archive_path).map_err(|e| QwkError::io(archive_path, e))?;
        }
        let archive = archive_path.to_string_lossy();
        let dir_arg = dir.to_string_lossy();
        let args = expand(
            &self.archive_command,
            &[("{archive}", &*archive), ("{dir}", &*dir_arg)],
            &files,
        );
        run(&args)
    }

    fn extract(&self, archive: &Path, pattern: &str, dest_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dest_dir).map_err(|e| QwkError::io(dest_dir, e))?;
        let archive_arg = archive.to_string_lossy();
        let dir_arg = dest_dir.to_string_lossy();
        let args = expand(
            &self.extract_command,
            &[
                ("{archive}", &*archive_arg),
                ("{pattern}", pattern),
                ("{dir}", &*dir_arg),
            ],
            &[],
        );
        run(&args)?;
        Ok(find_file(dest_dir, pattern).unwrap_or_else(|| dest_dir.join(pattern)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_placeholders() {
        let files = vec![PathBuf::from("/p/A.DAT"), PathBuf::from("/p/B.NDX")];
        let args = expand(
            "zip -j -q {archive} {files}",
            &[("{archive}", "/w/BBS.QWK")],
            &files,
        );
        assert_eq!(args, ["zip", "-j", "-q", "/w/BBS.QWK", "/p/A.DAT", "/p/B.NDX"]);

        let args = expand(
            "unzip -o {archive} {pattern} -d {dir}",
            &[("{archive}", "R.REP"), ("{pattern}", "BBS.MSG"), ("{dir}", "/w/rep")],
            &[],
        );
        assert_eq!(args, ["unzip", "-o", "R.REP", "BBS.MSG", "-d", "/w/rep"]);
    }

    #[test]
    fn test_empty_command_is_an_error() {
        assert!(matches!(run(&[]), Err(QwkError::Archive(_))));
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let args = vec!["qwkpack-no-such-archiver".to_string()];
        assert!(matches!(run(&args), Err(QwkError::Archive(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_commands() {
        let dir = tempfile::tempdir().unwrap();
        let packet = dir.path().join("qwk");
        std::fs::create_dir(&packet).unwrap();
        std::fs::write(packet.join("MESSAGES.DAT"), b"data").unwrap();

        let archiver = CommandArchiver {
            archive_command: "cp {files} {archive}".into(),
            extract_command: "cp {archive} {dir}/{pattern}".into(),
        };
        let archive = dir.path().join("BBS.QWK");
        archiver.archive(&packet, &archive).unwrap();
        assert_eq!(std::fs::read(&archive).unwrap(), b"data");

        let out = archiver
            .extract(&archive, "BBS.MSG", &dir.path().join("rep"))
            .unwrap();
        assert_eq!(out, dir.path().join("rep").join("BBS.MSG"));
        assert_eq!(std::fs::read(&out).unwrap(), b"data");
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        let archiver = CommandArchiver {
            archive_command: "false".into(),
            extract_command: "false".into(),
        };
        let err = archiver
            .archive(dir.path(), &dir.path().join("X.QWK"))
            .unwrap_err();
        assert!(matches!(err, QwkError::Archive(_)));
    }

    #[test]
    fn test_find_file_ignores_case() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bbs.msg"), b"x").unwrap();
        let found = find_file(dir.path(), "BBS.MSG").unwrap();
        assert!(found.is_file());
        assert!(find_file(dir.path(), "OTHER.MSG").is_none());
    }
}
