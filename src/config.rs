//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$QWKPACK_CONFIG` (environment variable)
//! 2. `~/.config/qwkpack/config.toml` (Linux/macOS)
//!    `%APPDATA%\qwkpack\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::UserProfile;
use crate::text::Palette;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Paths and logging.
    pub general: GeneralConfig,
    /// Board identity and packet limits.
    pub system: SystemConfig,
    /// The packet owner and their preferences.
    pub user: UserProfile,
    /// Archiver command templates.
    pub archive: ArchiveConfig,
    /// Color code translation.
    pub colors: ColorsConfig,
}

/// Paths and logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Board file used by the CLI. Defaults to `board.qwkb` in the data dir.
    pub board_file: Option<PathBuf>,
    /// Scratch directory where packets are assembled and replies unpacked.
    pub work_dir: Option<PathBuf>,
    /// Where finished packets are delivered and replies are picked up.
    pub transfer_dir: Option<PathBuf>,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Board identity and packet limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// System name, also the fallback packet name.
    pub name: String,
    /// Packet name override.
    pub packet_name: Option<String>,
    pub phone: String,
    pub sysop: String,
    /// Address appended to sender stamps of local messages.
    pub origin: Option<String>,
    /// Maximum messages per packet (0 = unlimited).
    pub max_messages: u32,
    /// Directory holding the hello/news/bye files.
    pub text_dir: Option<PathBuf>,
    pub hello: String,
    pub news: String,
    pub bye: String,
    /// Extra bulletins copied into every packet.
    pub bulletins: Vec<BulletinConfig>,
}

/// One bulletin file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletinConfig {
    /// Name inside the packet, conventionally `BLT-0.N`.
    pub name: String,
    pub path: PathBuf,
}

/// Archiver command templates.
///
/// Placeholders: `{archive}`, `{files}` (archive only), `{pattern}` and
/// `{dir}` (extract only).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub archive_command: String,
    pub extract_command: String,
}

/// Color code translation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    /// Attribute for each color digit `0`-`9`.
    pub palette: Palette,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            board_file: None,
            work_dir: None,
            transfer_dir: None,
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: "Local BBS".to_string(),
            packet_name: None,
            phone: String::new(),
            sysop: "Sysop".to_string(),
            origin: None,
            max_messages: 0,
            text_dir: None,
            hello: String::new(),
            news: String::new(),
            bye: String::new(),
            bulletins: Vec::new(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            archive_command: "zip -j -q {archive} {files}".to_string(),
            extract_command: "unzip -o -qq {archive} {pattern} -d {dir}".to_string(),
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("QWKPACK_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("qwkpack").join("config.toml"))
}

/// Return the data directory holding the board file.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("qwkpack")
}

/// Return the board file path.
pub fn board_file_path(config: &Config) -> PathBuf {
    config
        .general
        .board_file
        .clone()
        .unwrap_or_else(|| data_dir().join("board.qwkb"))
}

/// Return the scratch directory used to build and unpack packets.
pub fn work_dir(config: &Config) -> PathBuf {
    config
        .general
        .work_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("qwkpack"))
}

/// Return the directory packets are sent to and replies picked up from.
pub fn transfer_dir(config: &Config) -> PathBuf {
    config
        .general
        .transfer_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("qwkpack")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("qwkpack.log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::ColorMode;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.system.max_messages, 0);
        assert!(cfg.user.scan_mail);
        assert_eq!(cfg.colors.palette, Palette::default());
        assert!(cfg.archive.archive_command.contains("{archive}"));
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut cfg = Config::default();
        cfg.system.bulletins.push(BulletinConfig {
            name: "BLT-0.1".into(),
            path: PathBuf::from("/srv/bbs/blt1.txt"),
        });
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.system.name, cfg.system.name);
        assert_eq!(parsed.system.bulletins, cfg.system.bulletins);
        assert_eq!(parsed.user, cfg.user);
        assert_eq!(parsed.colors.palette, cfg.colors.palette);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[system]
name = "Night Owl"
max_messages = 500

[user]
name = "Jane Doe"
color = "ansi"
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.system.name, "Night Owl");
        assert_eq!(cfg.system.max_messages, 500);
        assert_eq!(cfg.user.name, "Jane Doe");
        assert_eq!(cfg.user.color, ColorMode::Ansi);
        // Other fields use defaults
        assert!(cfg.user.update_read_pointers);
        assert_eq!(cfg.general.log_level, "warn");
    }

    #[test]
    fn test_palette_from_toml() {
        let cfg: Config = toml::from_str("[colors]\npalette = [7, 7, 7, 7, 7, 7, 7, 7, 7, 15]\n")
            .expect("parse palette");
        assert_eq!(cfg.colors.palette.attribute(b'9'), Some(15));
    }
}
