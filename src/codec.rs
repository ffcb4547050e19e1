//! Command encoding for outbound traffic and text decoding for inbound frames.
//!
//! Every encoder here is pure: it produces the complete byte sequence for one
//! send call (or an error) without touching the port. The session writes the
//! result in a single call, so an encode failure never leaves a partial
//! command on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Byte value that terminates every inbound frame.
pub const FRAME_SENTINEL: u8 = 0xFF;

/// Errors produced while turning caller input into wire bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// A hex token contained something other than hex digits (or was empty).
    #[error("Invalid hex token '{token}' at position {index}")]
    InvalidHexToken { index: usize, token: String },

    /// A hex token parsed but does not fit in a single byte.
    #[error("Hex token '{token}' at position {index} is out of byte range (0-255)")]
    HexOutOfRange { index: usize, token: String },

    /// The configured text encoding cannot represent a character.
    #[error("Character {ch:?} cannot be encoded as {encoding}")]
    Unrepresentable { ch: char, encoding: TextEncoding },
}

/// Text encoding used for `send_line` and for decoding received frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    /// 7-bit ASCII. Decoding maps bytes above 0x7F to `?`.
    #[default]
    Ascii,
    /// UTF-8. Decoding replaces invalid sequences with U+FFFD.
    Utf8,
    /// ISO-8859-1: every byte is the code point of the same value.
    Latin1,
}

impl TextEncoding {
    /// Encode `text` strictly; the first unrepresentable character is an error.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, EncodeError> {
        match self {
            Self::Utf8 => Ok(text.as_bytes().to_vec()),
            Self::Ascii => self.encode_below(text, 0x80),
            Self::Latin1 => self.encode_below(text, 0x100),
        }
    }

    fn encode_below(self, text: &str, limit: u32) -> Result<Vec<u8>, EncodeError> {
        text.chars()
            .map(|ch| {
                if (ch as u32) < limit {
                    Ok(ch as u32 as u8)
                } else {
                    Err(EncodeError::Unrepresentable { ch, encoding: self })
                }
            })
            .collect()
    }

    /// Decode a received frame. Never fails.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { '?' })
                .collect(),
            Self::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ascii => "ascii",
            Self::Utf8 => "utf-8",
            Self::Latin1 => "latin-1",
        };
        f.write_str(name)
    }
}

impl FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(Self::Latin1),
            other => Err(format!("unknown text encoding '{other}'")),
        }
    }
}

/// Line terminator appended by `send_line`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Newline {
    #[default]
    Lf,
    Cr,
    CrLf,
}

impl Newline {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::Cr => "\r",
            Self::CrLf => "\r\n",
        }
    }
}

/// Encode `text` followed by the newline sequence.
pub fn encode_line(
    text: &str,
    newline: Newline,
    encoding: TextEncoding,
) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = encoding.encode(text)?;
    bytes.extend_from_slice(newline.as_str().as_bytes());
    Ok(bytes)
}

/// Map each character to the low byte of its code point.
///
/// Code points above 0xFF are truncated, not rejected: `'Ā'` (U+0100) becomes
/// `0x00`.
pub fn encode_char_codes(text: &str) -> Vec<u8> {
    text.chars().map(|ch| ch as u32 as u8).collect()
}

/// Parse space-separated hex byte tokens such as `"1A 2B FF"`.
///
/// Tokens are separated by exactly one space, so doubled spaces produce an
/// empty (invalid) token. An optional `0x`/`0X` prefix is accepted.
pub fn encode_hex_tokens(text: &str) -> Result<Vec<u8>, EncodeError> {
    text.split(' ')
        .enumerate()
        .map(|(index, token)| parse_hex_byte(index, token))
        .collect()
}

fn parse_hex_byte(index: usize, token: &str) -> Result<u8, EncodeError> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(EncodeError::InvalidHexToken {
            index,
            token: token.to_string(),
        });
    }

    let significant = digits.trim_start_matches('0');
    if significant.len() > 2 {
        return Err(EncodeError::HexOutOfRange {
            index,
            token: token.to_string(),
        });
    }

    // At most two hex digits remain, which always fits in a u8.
    Ok(significant
        .bytes()
        .fold(0u8, |acc, b| (acc << 4) | hex_value(b)))
}

fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        _ => b - b'A' + 10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_tokens_basic() {
        assert_eq!(encode_hex_tokens("1A 2B FF").unwrap(), vec![0x1A, 0x2B, 0xFF]);
        assert_eq!(encode_hex_tokens("0 a 0x7f 00FF").unwrap(), vec![0x00, 0x0A, 0x7F, 0xFF]);
    }

    #[test]
    fn test_hex_tokens_invalid() {
        let err = encode_hex_tokens("1A ZZ").unwrap_err();
        assert_eq!(
            err,
            EncodeError::InvalidHexToken {
                index: 1,
                token: "ZZ".into()
            }
        );

        assert!(matches!(
            encode_hex_tokens("1A  2B"),
            Err(EncodeError::InvalidHexToken { index: 1, .. })
        ));
        assert!(encode_hex_tokens("").is_err());
        assert!(encode_hex_tokens("+1").is_err());
        assert!(encode_hex_tokens("0x").is_err());
    }

    #[test]
    fn test_hex_tokens_out_of_range() {
        assert!(matches!(
            encode_hex_tokens("100"),
            Err(EncodeError::HexOutOfRange { index: 0, .. })
        ));
        assert!(matches!(
            encode_hex_tokens("01 FFFFFFFFFF"),
            Err(EncodeError::HexOutOfRange { index: 1, .. })
        ));
    }

    #[test]
    fn test_char_codes_truncate() {
        assert_eq!(encode_char_codes("AB"), vec![0x41, 0x42]);
        assert_eq!(encode_char_codes("\u{0100}\u{01FF}é"), vec![0x00, 0xFF, 0xE9]);
        assert!(encode_char_codes("").is_empty());
    }

    #[test]
    fn test_encode_line_newlines() {
        let ascii = TextEncoding::Ascii;
        assert_eq!(encode_line("ON", Newline::Lf, ascii).unwrap(), b"ON\n");
        assert_eq!(encode_line("ON", Newline::Cr, ascii).unwrap(), b"ON\r");
        assert_eq!(encode_line("ON", Newline::CrLf, ascii).unwrap(), b"ON\r\n");
    }

    #[test]
    fn test_strict_encoding() {
        assert!(matches!(
            TextEncoding::Ascii.encode("caf\u{e9}"),
            Err(EncodeError::Unrepresentable { ch: '\u{e9}', .. })
        ));
        assert_eq!(TextEncoding::Latin1.encode("caf\u{e9}").unwrap(), b"caf\xE9");
        assert_eq!(TextEncoding::Utf8.encode("caf\u{e9}").unwrap(), "caf\u{e9}".as_bytes());
    }

    #[test]
    fn test_lossy_decoding() {
        assert_eq!(TextEncoding::Ascii.decode(b"OK\x80"), "OK?");
        assert_eq!(TextEncoding::Latin1.decode(b"caf\xE9"), "caf\u{e9}");
        assert_eq!(TextEncoding::Utf8.decode(b"a\xC3"), "a\u{FFFD}");
    }

    #[test]
    fn test_encoding_from_str() {
        assert_eq!("UTF-8".parse::<TextEncoding>().unwrap(), TextEncoding::Utf8);
        assert_eq!("iso_8859_1".parse::<TextEncoding>().unwrap(), TextEncoding::Latin1);
        assert!("ebcdic".parse::<TextEncoding>().is_err());
    }
}
