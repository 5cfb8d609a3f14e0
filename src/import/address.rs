//! Normalizing recipient addresses taken from replies.
//!
//! Readers put whatever the user typed into the `to` field. Two forms get
//! reduced before delivery:
//!
//! * `NAME #12`: a local user by number; only `12` is kept.
//! * ``` ``Real Name``user@host AT GATEWAY ```: a gated address; the
//!   quoted display name is dropped.

/// Separator of gated addresses.
const GATEWAY_MARKER: &str = " AT ";

/// Quote around a gated display name.
const NAME_QUOTE: &str = "``";

/// Upper-case, trim and reduce an address to the form the mailbox expects.
pub fn normalize(address: &str) -> String {
    let upper = address.trim().to_uppercase();

    let reduced = if !upper.contains(GATEWAY_MARKER) {
        match upper.find('#') {
            Some(at) => &upper[at + 1..],
            None => upper.as_str(),
        }
    } else {
        strip_gated_name(&upper)
    };
    reduced.trim().to_string()
}

fn strip_gated_name(address: &str) -> &str {
    let Some(open) = address.find(NAME_QUOTE) else {
        return address;
    };
    let after_open = open + NAME_QUOTE.len();
    match address[after_open..].find(NAME_QUOTE) {
        Some(close) => &address[after_open + close + NAME_QUOTE.len()..],
        None => address,
    }
}
