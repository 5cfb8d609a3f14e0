//! On-disk QWK formats: the 128-byte record, MBF floats, `.NDX` indices
//! and the `CONTROL.DAT` manifest. [`space`] accounts for what they take.

pub mod control;
pub mod index;
pub mod msbin;
pub mod record;
pub mod space;

pub use control::Manifest;
pub use index::{IndexEntry, IndexWriter};
pub use record::{QwkRecord, RECORD_SIZE};
pub use space::SpaceBudget;

/// Name of the message file in an export packet.
pub const MESSAGES_FILE: &str = "MESSAGES.DAT";

/// Maximum length of a packet name stem.
const PACKET_NAME_LEN: usize = 8;

/// Derive the packet name stem used for `<NAME>.QWK`, `<NAME>.REP` and
/// `<NAME>.MSG`.
///
/// The configured name wins when non-empty, otherwise the system name is
/// used. The result is cut to eight characters with spaces and periods
/// turned into `-`, then upper-cased.
pub fn packet_name(configured: Option<&str>, system_name: &str) -> String {
    let source = configured
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(system_name);
    source
        .chars()
        .take(PACKET_NAME_LEN)
        .map(|c| match c {
            ' ' | '.' => '-',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

/// File name of the reply message file inside a `.REP` archive.
pub fn reply_message_file(packet_name: &str) -> String {
    format!("{packet_name}.MSG")
}

/// File name of the reply archive a reader uploads.
pub fn reply_archive_file(packet_name: &str) -> String {
    format!("{packet_name}.REP")
}

/// File name of the export archive.
pub fn packet_archive_file(packet_name: &str) -> String {
    format!("{packet_name}.QWK")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_name_from_system_name() {
        assert_eq!(packet_name(None, "My BBS.org"), "MY-BBS-O");
        assert_eq!(packet_name(None, "wwiv"), "WWIV");
    }

    #[test]
    fn test_packet_name_prefers_configured() {
        assert_eq!(packet_name(Some("qwk.pack"), "Other"), "QWK-PACK");
        assert_eq!(packet_name(Some("  "), "Other"), "OTHER");
    }

    #[test]
    fn test_derived_file_names() {
        assert_eq!(reply_message_file("MYBBS"), "MYBBS.MSG");
        assert_eq!(reply_archive_file("MYBBS"), "MYBBS.REP");
        assert_eq!(packet_archive_file("MYBBS"), "MYBBS.QWK");
    }
}
