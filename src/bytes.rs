//! Stateless byte helpers: hex encode/decode, concatenation, timestamp and
//! hex-dump row formatting.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Bytes per hex dump row.
pub const HEX_ROW_WIDTH: usize = 16;

/// Time zone used when rendering timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timezone {
    #[default]
    Local,
    Utc,
}

/// Encode bytes as uppercase hex pairs separated by spaces (`"0A FF"`).
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        push_hex_pair(&mut out, *b);
    }
    out
}

/// Decode a loosely formatted hex string.
///
/// Whitespace, commas, `:`/`-` separators and `0x` prefixes are stripped
/// before decoding. Odd-length or non-hex input yields `None`, never partial
/// bytes.
pub fn hex_decode(input: &str) -> Option<Vec<u8>> {
    let cleaned = strip_hex_noise(input);
    if cleaned.len() % 2 != 0 {
        return None;
    }

    cleaned
        .as_bytes()
        .chunks_exact(2)
        .map(|pair| Some((hex_value(pair[0])? << 4) | hex_value(pair[1])?))
        .collect()
}

fn strip_hex_noise(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for token in input.split(|c: char| c.is_whitespace() || matches!(c, ',' | ':' | '-' | ';')) {
        let token = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        out.push_str(token);
    }
    out
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn push_hex_pair(out: &mut String, b: u8) {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    out.push(DIGITS[(b >> 4) as usize] as char);
    out.push(DIGITS[(b & 0x0F) as usize] as char);
}

/// Concatenate byte buffers in order.
pub fn concat<B: AsRef<[u8]>>(parts: impl IntoIterator<Item = B>) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(part.as_ref());
    }
    out
}

/// Format a millisecond epoch timestamp as `HH:MM:SS.mmm`.
pub fn format_timestamp(timestamp_ms: i64, tz: Timezone) -> String {
    match tz {
        Timezone::Local => format_timestamp_in(timestamp_ms, &Local),
        Timezone::Utc => format_timestamp_in(timestamp_ms, &Utc),
    }
}

fn format_timestamp_in<Tz>(timestamp_ms: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    match DateTime::<Utc>::from_timestamp_millis(timestamp_ms) {
        Some(utc) => utc
            .with_timezone(tz)
            .format("%H:%M:%S%.3f")
            .to_string(),
        None => "--:--:--.---".to_string(),
    }
}

/// Sortable stamp for file names: `YYYYMMDD-HHMMSS`.
pub fn file_stamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d-%H%M%S").to_string()
}

/// Format one hex dump row: 8-digit offset, up to 16 uppercase byte pairs,
/// blank-padded so the ASCII column lines up, then the printable column.
///
/// ```
/// use serial_terminal::bytes::hex_dump_row;
///
/// assert_eq!(
///     hex_dump_row(0x10, b"AB\n"),
///     "00000010  41 42 0A                                         |AB.|"
/// );
/// ```
pub fn hex_dump_row(offset: u64, bytes: &[u8]) -> String {
    debug_assert!(bytes.len() <= HEX_ROW_WIDTH);
    let mut out = String::with_capacity(10 + HEX_ROW_WIDTH * 3 + 4 + HEX_ROW_WIDTH);
    out.push_str(&format!("{:08X}  ", offset));
    for i in 0..HEX_ROW_WIDTH {
        if i > 0 {
            out.push(' ');
        }
        match bytes.get(i) {
            Some(b) => push_hex_pair(&mut out, *b),
            None => out.push_str("  "),
        }
    }
    out.push_str("  |");
    out.extend(bytes.iter().map(|&b| printable(b)));
    out.push('|');
    out
}

fn printable(b: u8) -> char {
    if (0x20..=0x7E).contains(&b) {
        b as char
    } else {
        '.'
    }
}
