//! RFC 4648 base-32 codec for authenticator secrets.
//!
//! Secrets arrive the way people paste them: mixed case, grouped with
//! spaces or dashes, sometimes padded with `=`. Decoding strips the
//! grouping and padding, folds case, and then rejects anything outside
//! the RFC alphabet so a mistyped secret errors out instead of quietly
//! producing codes that never match.

use crate::totp::types::{TotpError, TotpErrorKind, TotpResult};

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Decode base-32 text into bytes.
///
/// Whitespace and dashes are treated as visual separators and ignored.
/// Trailing `=` padding is accepted and stripped; a `=` anywhere else
/// is rejected like any other non-alphabet character.
pub fn decode(input: &str) -> TotpResult<Vec<u8>> {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let cleaned = cleaned.trim_end_matches('=');

    let mut out = Vec::with_capacity(cleaned.len() * 5 / 8);
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    for c in cleaned.chars() {
        let value = char_value(c).ok_or_else(|| {
            TotpError::new(
                TotpErrorKind::InvalidEncoding,
                format!("invalid base-32 character '{}'", c),
            )
        })?;
        acc = (acc << 5) | value as u32;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
        }
    }
    // Leftover bits (< 8) never form a byte and are dropped.
    Ok(out)
}

/// Encode bytes as unpadded base-32 text.
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(5) * 8);
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    for &b in bytes {
        acc = (acc << 8) | b as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((acc >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ALPHABET[((acc << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

fn char_value(c: char) -> Option<u8> {
    match c {
        'A'..='Z' => Some(c as u8 - b'A'),
        '2'..='7' => Some(c as u8 - b'2' + 26),
        _ => None,
    }
}
