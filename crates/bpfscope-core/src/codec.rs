//! Textual byte sequences.
//!
//! Keys and values are typed on the command line as one token per byte, in
//! any base `strtoul(…, 0)` understands, and printed back as two-digit hex
//! grouped by eight and wrapped every sixteen bytes.

use std::fmt::Write;

use crate::error::{ParseError, Slot};

/// Whether `token` abbreviates `keyword` (`k` matches `key`).
pub fn is_prefix(token: &str, keyword: &str) -> bool {
    !token.is_empty() && keyword.starts_with(token)
}

/// Parse an unsigned integer with C base detection: `0x` hex, leading `0`
/// octal, decimal otherwise. The whole token must be consumed.
pub fn parse_ulong(token: &str) -> Option<u64> {
    let (digits, radix) = if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        (hex, 16)
    } else if token.len() > 1 && token.starts_with('0') {
        (&token[1..], 8)
    } else {
        (token, 10)
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u64::from_str_radix(digits, radix).ok()
}

/// Fill `out` with one byte per token and return how many tokens were used.
///
/// Stops at the first token that is not a byte literal; if `out` is not yet
/// full at that point the token is reported. Running out of tokens early is
/// a length mismatch.
pub fn parse_bytes<S: AsRef<str>>(
    tokens: &[S],
    slot: Slot,
    out: &mut [u8],
) -> Result<usize, ParseError> {
    let mut filled = 0;
    while filled < out.len() {
        let Some(token) = tokens.get(filled) else {
            return Err(ParseError::LengthMismatch {
                slot,
                expected: out.len(),
                got: filled,
            });
        };
        let token = token.as_ref();
        match parse_ulong(token).and_then(|v| u8::try_from(v).ok()) {
            Some(byte) => out[filled] = byte,
            None => {
                return Err(ParseError::BadByte {
                    token: token.to_string(),
                })
            }
        }
        filled += 1;
    }
    Ok(filled)
}

/// Render bytes as hex: `sep` between bytes of a group of eight, two spaces
/// between groups, and a newline every sixteen bytes.
pub fn format_hex(buf: &[u8], sep: &str) -> String {
    let mut out = String::with_capacity(buf.len() * 3);
    for (i, byte) in buf.iter().enumerate() {
        if i > 0 {
            if i % 16 == 0 {
                out.push('\n');
            } else if i % 8 == 0 {
                out.push_str("  ");
            } else {
                out.push_str(sep);
            }
        }
        let _ = write!(out, "{byte:02x}");
    }
    out
}
