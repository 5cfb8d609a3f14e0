//! Translation of in-band color codes into ANSI escape sequences.
//!
//! A color code is a digit `0`-`9` selecting one of ten configurable
//! attributes. An attribute byte uses the PC text-mode layout:
//!
//! ```text
//! bit 7    blink
//! bits 4-6 background
//! bit 3    bold
//! bits 0-2 foreground
//! ```

use serde::{Deserialize, Serialize};

/// PC color order (blue first) to ANSI color order (red first).
const PC_TO_ANSI: [u8; 8] = [0, 4, 2, 6, 1, 5, 3, 7];

/// Attributes selected by color codes `0` through `9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Palette(pub [u8; 10]);

impl Default for Palette {
    fn default() -> Self {
        Self([7, 11, 14, 5, 31, 2, 12, 9, 6, 3])
    }
}

impl Palette {
    /// Attribute for a color digit, if `digit` is one.
    pub fn attribute(&self, digit: u8) -> Option<u8> {
        if digit.is_ascii_digit() {
            Some(self.0[(digit - b'0') as usize])
        } else {
            None
        }
    }

    /// ANSI sequence for a color digit.
    pub fn escape_for(&self, digit: u8) -> Option<String> {
        self.attribute(digit).map(escape)
    }
}

/// Build a full ANSI SGR sequence that resets and then sets `attr`.
pub fn escape(attr: u8) -> String {
    let mut out = String::from("\x1b[0;");
    if attr & 0x08 != 0 {
        out.push_str("1;");
    }
    if attr & 0x80 != 0 {
        out.push_str("5;");
    }
    let fg = PC_TO_ANSI[(attr & 0x07) as usize];
    let bg = PC_TO_ANSI[((attr >> 4) & 0x07) as usize];
    out.push_str(&format!("3{fg};4{bg}m"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_grey_on_black() {
        assert_eq!(escape(0x07), "\x1b[0;37;40m");
    }

    #[test]
    fn test_bold_and_blink() {
        // Bright yellow on black.
        assert_eq!(escape(0x0E), "\x1b[0;1;33;40m");
        // Blinking bright white on blue.
        assert_eq!(escape(0x9F), "\x1b[0;1;5;37;44m");
    }

    #[test]
    fn test_color_order_is_swapped() {
        // PC blue (1) is ANSI blue (4), PC red (4) is ANSI red (1).
        assert_eq!(escape(0x01), "\x1b[0;34;40m");
        assert_eq!(escape(0x04), "\x1b[0;31;40m");
    }

    #[test]
    fn test_palette_lookup() {
        let p = Palette::default();
        assert_eq!(p.attribute(b'0'), Some(7));
        assert_eq!(p.attribute(b'4'), Some(31));
        assert_eq!(p.attribute(b'x'), None);
        assert_eq!(p.escape_for(b'0').as_deref(), Some("\x1b[0;37;40m"));
    }
}
