//! Conversion between the board's internal text and QWK wire text.
//!
//! Internal text uses CR line endings (often followed by LF), in-band color
//! codes (`0x03` plus a digit) and routing lines (`0x04 '0'` up to the end
//! of the line). Wire text ends every line with [`WIRE_NEWLINE`] and never
//! contains LF or NUL.
//!
//! [`to_wire`] scans left to right and applies the first matching rule to
//! each byte:
//!
//! 1. NUL ends the text.
//! 2. CR becomes [`WIRE_NEWLINE`].
//! 3. LF and bytes below `0x03` are dropped.
//! 4. A color code is kept, dropped or translated to ANSI per [`ColorMode`].
//! 5. A routing line is kept, or skipped through its line end.
//! 6. Any other `0x04` pair is dropped.
//! 7. Everything else is copied.
//!
//! The sender's address stamp is then inserted after the leading routing
//! block unless the text already carries a `QWKFrom:` marker.
//!
//! Stripped colors and routing lines are not recoverable by [`from_wire`].

pub mod ansi;

use serde::{Deserialize, Serialize};

pub use ansi::Palette;

/// Line terminator on the wire.
pub const WIRE_NEWLINE: u8 = 0xE3;

/// Introduces a color code.
pub const COLOR_CODE: u8 = 0x03;

/// Introduces a routing line (when followed by `'0'`).
pub const ROUTING_CODE: u8 = 0x04;

/// Marker preceding the sender's address in a message body.
pub const FROM_MARKER: &[u8] = b"QWKFrom:";

/// What to do with color codes when writing wire text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Copy color codes unchanged.
    #[default]
    Keep,
    /// Drop color codes.
    Strip,
    /// Replace color codes with ANSI escape sequences.
    Ansi,
}

/// Options for [`to_wire`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextOptions {
    pub color: ColorMode,
    pub keep_routing: bool,
    pub palette: Palette,
}

impl TextOptions {
    /// Options that preserve everything a reader could display.
    pub fn preserve() -> Self {
        Self {
            color: ColorMode::Keep,
            keep_routing: true,
            palette: Palette::default(),
        }
    }
}

/// Build the address stamp for a sender.
///
/// The origin system is appended as `@system` only when the name does not
/// already carry an address.
pub fn address_stamp(from: &str, origin_system: Option<&str>) -> Vec<u8> {
    let mut stamp = vec![ROUTING_CODE, b'0'];
    stamp.extend_from_slice(FROM_MARKER);
    stamp.extend_from_slice(from.as_bytes());
    if let Some(system) = origin_system.filter(|s| !s.is_empty()) {
        if !from.contains('@') {
            stamp.push(b'@');
            stamp.extend_from_slice(system.as_bytes());
        }
    }
    stamp
}

/// Convert internal text into wire text, inserting `stamp` when the text
/// has no `QWKFrom:` marker of its own.
pub fn to_wire(text: &[u8], stamp: &[u8], opts: &TextOptions) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + stamp.len() + 2);
    let mut pos = 0;

    while pos < text.len() {
        let b = text[pos];
        let next = text.get(pos + 1).copied();
        match b {
            0 => break,
            b'\r' => {
                out.push(WIRE_NEWLINE);
                pos += 1;
            }
            b'\n' | 1 | 2 => pos += 1,
            COLOR_CODE if next.is_some_and(|d| d.is_ascii_digit()) => {
                let digit = next.unwrap_or(b'0');
                match opts.color {
                    ColorMode::Keep => out.extend_from_slice(&[b, digit]),
                    ColorMode::Strip => {}
                    ColorMode::Ansi => {
                        if let Some(seq) = opts.palette.escape_for(digit) {
                            out.extend_from_slice(seq.as_bytes());
                        }
                    }
                }
                pos += 2;
            }
            ROUTING_CODE if next == Some(b'0') => {
                if opts.keep_routing {
                    out.extend_from_slice(&[b, b'0']);
                    pos += 2;
                } else {
                    pos = skip_line(text, pos);
                }
            }
            ROUTING_CODE => pos += 2,
            _ => {
                out.push(b);
                pos += 1;
            }
        }
    }

    if !contains(&out, FROM_MARKER) && !stamp.is_empty() {
        insert_after_routing(&mut out, stamp);
    }
    out
}

/// Index just past the line starting at `pos`: past its CR or wire
/// newline and a directly following LF.
fn skip_line(text: &[u8], mut pos: usize) -> usize {
    while pos < text.len() && !matches!(text[pos], b'\r' | WIRE_NEWLINE | 0) {
        pos += 1;
    }
    if pos < text.len() && text[pos] != 0 {
        pos += 1;
    }
    if text.get(pos) == Some(&b'\n') {
        pos += 1;
    }
    pos
}

/// Insert the color-stripped stamp and a blank line after any leading
/// routing lines.
fn insert_after_routing(text: &mut Vec<u8>, stamp: &[u8]) {
    let mut insert = strip_colors(stamp);
    insert.extend_from_slice(&[WIRE_NEWLINE, WIRE_NEWLINE]);

    let mut pos = 0;
    while text.get(pos) == Some(&ROUTING_CODE) && text.get(pos + 1) == Some(&b'0') {
        match text[pos..].iter().position(|&b| b == WIRE_NEWLINE) {
            Some(end) => pos += end + 1,
            None => pos = text.len(),
        }
    }
    text.splice(pos..pos, insert);
}

/// Convert wire text back into CRLF text and trim trailing spaces.
///
/// Only spaces are trimmed; trailing tabs or other whitespace survive.
pub fn from_wire(wire: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(wire.len() + wire.len() / 16);
    for &b in wire {
        if b == WIRE_NEWLINE {
            out.extend_from_slice(b"\r\n");
        } else {
            out.push(b);
        }
    }
    let end = out
        .iter()
        .rposition(|&b| b != b' ')
        .map(|p| p + 1)
        .unwrap_or(0);
    out.truncate(end);
    out
}

/// Remove every color code (`0x03` plus a digit).
pub fn strip_colors(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut pos = 0;
    while pos < text.len() {
        if text[pos] == COLOR_CODE && text.get(pos + 1).is_some_and(|d| d.is_ascii_digit()) {
            pos += 2;
        } else {
            out.push(text[pos]);
            pos += 1;
        }
    }
    out
}

/// [`strip_colors`] for names and titles.
pub fn strip_colors_str(text: &str) -> String {
    String::from_utf8_lossy(&strip_colors(text.as_bytes())).into_owned()
}

/// Recover the sender address stamped into a reply body.
///
/// Takes the text after the first `QWKFrom:` up to the end of its line,
/// trimmed and upper-cased. Returns `None` when there is no marker or the
/// address is empty.
pub fn find_forwarding_address(body: &[u8]) -> Option<String> {
    let start = find(body, FROM_MARKER)? + FROM_MARKER.len();
    let rest = &body[start..];
    let end = rest
        .iter()
        .position(|&b| matches!(b, b'\r' | b'\n' | WIRE_NEWLINE))
        .unwrap_or(rest.len());
    let address = String::from_utf8_lossy(&rest[..end]).trim().to_uppercase();
    if address.is_empty() {
        None
    } else {
        Some(address)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip() -> TextOptions {
        TextOptions {
            color: ColorMode::Strip,
            keep_routing: false,
            palette: Palette::default(),
        }
    }

    #[test]
    fn test_line_endings() {
        let wire = to_wire(b"one\r\ntwo\rthree", b"", &strip());
        assert_eq!(wire, b"one\xE3two\xE3three");
        assert_eq!(from_wire(&wire), b"one\r\ntwo\r\nthree");
    }

    #[test]
    fn test_nul_terminates_and_low_controls_dropped() {
        let wire = to_wire(b"a\x01b\x02c\0ignored", b"", &strip());
        assert_eq!(wire, b"abc");
    }

    #[test]
    fn test_color_modes() {
        let text = b"\x031Hi\x03x";
        assert_eq!(to_wire(text, b"", &strip()), b"Hi\x03x");

        let keep = TextOptions::preserve();
        assert_eq!(to_wire(text, b"", &keep), b"\x031Hi\x03x");

        let ansi = TextOptions {
            color: ColorMode::Ansi,
            ..TextOptions::preserve()
        };
        // Digit 1 is attribute 11: bright cyan on black.
        assert_eq!(to_wire(text, b"", &ansi), b"\x1b[0;1;36;40mHi\x03x");
    }

    #[test]
    fn test_routing_skipped_through_line_end() {
        let text = b"\x040ROUTE 1@2\r\nBody\r";
        assert_eq!(to_wire(text, b"", &strip()), b"Body\xE3");

        let keep = TextOptions::preserve();
        assert_eq!(to_wire(text, b"", &keep), b"\x040ROUTE 1@2\xE3Body\xE3");
    }

    #[test]
    fn test_other_routing_pairs_dropped() {
        assert_eq!(to_wire(b"a\x04Xb", b"", &TextOptions::preserve()), b"ab");
    }

    #[test]
    fn test_stamp_inserted_at_start() {
        let stamp = address_stamp("SYSOP", Some("1"));
        let wire = to_wire(b"Hello\r", &stamp, &strip());
        assert_eq!(wire, b"\x040QWKFrom:SYSOP@1\xE3\xE3Hello\xE3");
    }

    #[test]
    fn test_stamp_inserted_after_routing_block() {
        let stamp = address_stamp("SYSOP", None);
        let wire = to_wire(
            b"\x040R1\r\x040R2\rHello\r",
            &stamp,
            &TextOptions::preserve(),
        );
        assert_eq!(
            wire,
            b"\x040R1\xE3\x040R2\xE3\x040QWKFrom:SYSOP\xE3\xE3Hello\xE3"
        );
    }

    #[test]
    fn test_stamp_not_duplicated() {
        let stamp = address_stamp("SYSOP", None);
        let text = b"\x040QWKFrom:OTHER\rHello\r";
        let wire = to_wire(text, &stamp, &TextOptions::preserve());
        assert_eq!(wire, b"\x040QWKFrom:OTHER\xE3Hello\xE3");
    }

    #[test]
    fn test_stamp_is_color_stripped() {
        let stamp = address_stamp("\x035BOB", None);
        let wire = to_wire(b"x", &stamp, &TextOptions::preserve());
        assert!(wire.starts_with(b"\x040QWKFrom:BOB\xE3\xE3"));
    }

    #[test]
    fn test_address_stamp_origin() {
        assert_eq!(address_stamp("BOB", Some("7")), b"\x040QWKFrom:BOB@7");
        assert_eq!(address_stamp("BOB@9", Some("7")), b"\x040QWKFrom:BOB@9");
        assert_eq!(address_stamp("BOB", Some("")), b"\x040QWKFrom:BOB");
    }

    #[test]
    fn test_from_wire_trims_only_spaces() {
        assert_eq!(from_wire(b"text   "), b"text");
        assert_eq!(from_wire(b"text\t "), b"text\t");
        assert_eq!(from_wire(b"text\xE3   "), b"text\r\n");
        assert_eq!(from_wire(b"    "), b"");
    }

    #[test]
    fn test_preserve_roundtrip_keeps_visible_bytes() {
        let text = b"Line one\r\nLine \x032two\r\n  indented\r\nlast";
        let wire = to_wire(text, b"", &TextOptions::preserve());
        let back = from_wire(&wire);
        assert_eq!(back, b"Line one\r\nLine \x032two\r\n  indented\r\nlast");
    }

    #[test]
    fn test_strip_colors() {
        assert_eq!(strip_colors(b"\x031A\x03\x032B"), b"A\x03B");
        assert_eq!(strip_colors_str("\x037Title"), "Title");
    }

    #[test]
    fn test_find_forwarding_address() {
        let body = b"\x040QWKFrom: joe@5 \r\n\r\nHello";
        assert_eq!(find_forwarding_address(body).as_deref(), Some("JOE@5"));
        assert_eq!(find_forwarding_address(b"QWKFrom:   \r\n"), None);
        assert_eq!(find_forwarding_address(b"no marker"), None);
    }
}
