//! Binary board file format.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ HEADER (128 bytes, fixed)            │
//! │  magic: [u8; 8] = b"QWKBOARD"        │
//! │  version: u32                        │
//! │  flags: u32                          │
//! │  payload_len: u64                    │
//! │  sha256_payload: [u8; 32]            │
//! │  (padding to 128 bytes)              │
//! ├──────────────────────────────────────┤
//! │ PAYLOAD (variable)                   │
//! │  bincode-serialized BoardData        │
//! └──────────────────────────────────────┘
//! ```

/// Magic bytes identifying a board file.
pub const MAGIC: &[u8; 8] = b"QWKBOARD";

/// Current board format version.
pub const VERSION: u32 = 1;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 128;

/// Serializable board header.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct BoardHeader {
    /// Magic bytes (must equal [`MAGIC`]).
    pub magic: [u8; 8],
    /// Format version (must equal [`VERSION`]).
    pub version: u32,
    /// Reserved flags (currently unused).
    pub flags: u32,
    /// Length of the payload following the header.
    pub payload_len: u64,
    /// SHA-256 of the payload.
    pub sha256_payload: [u8; 32],
}

impl BoardHeader {
    /// Validate that the header is well-formed and matches the current format.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.magic != *MAGIC {
            return Err("Invalid magic bytes".into());
        }
        if self.version != VERSION {
            return Err(format!(
                "Incompatible version: expected {VERSION}, found {}",
                self.version
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_fits() {
        let header = BoardHeader {
            magic: *MAGIC,
            version: VERSION,
            flags: 0,
            payload_len: 42,
            sha256_payload: [7; 32],
        };
        let bytes = bincode::serialize(&header).unwrap();
        assert!(bytes.len() <= HEADER_SIZE);
        assert!(header.validate().is_ok());
    }

    #[test]
    fn test_bad_magic_and_version() {
        let mut header = BoardHeader {
            magic: *b"MBOXTUI\0",
            version: VERSION,
            flags: 0,
            payload_len: 0,
            sha256_payload: [0; 32],
        };
        assert!(header.validate().is_err());
        header.magic = *MAGIC;
        header.version = VERSION + 1;
        assert!(header.validate().unwrap_err().contains("Incompatible"));
    }
}
