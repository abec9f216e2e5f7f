//! Render formatter: turns batches of received chunks into display text.
//!
//! All state that must survive a chunk boundary lives in [`FormatterState`],
//! which the caller owns and threads through every call. Feeding the same
//! history through a fresh state reproduces the live output exactly, which is
//! what repaint and export rely on.
//!
//! Modes:
//! - raw text: bytes decoded as UTF-8, nothing added
//! - timestamped text: a `[HH:MM:SS.mmm] ` tag before the first character of
//!   every line, using the timestamp of the chunk that carries that character
//! - hex dump: 16-byte rows; the trailing incomplete row is shown
//!   speculatively and erased/rewritten when more bytes arrive

use crate::bytes::{format_timestamp, hex_dump_row, Timezone, HEX_ROW_WIDTH};
use crate::history::Chunk;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Returns the cursor to column 0 and clears the line.
pub const ERASE_LINE: &str = "\r\x1b[2K";

/// Terminates a hex dump row.
pub const ROW_END: &str = "\r\n";

/// How received bytes are shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Text,
    Hex,
}

impl FromStr for DisplayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "ascii" => Ok(DisplayMode::Text),
            "hex" | "hexdump" => Ok(DisplayMode::Hex),
            other => Err(format!("invalid display mode '{other}', expected text or hex")),
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayMode::Text => f.write_str("text"),
            DisplayMode::Hex => f.write_str("hex"),
        }
    }
}

/// Every setting that affects rendered output. Changing any of them requires
/// a repaint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSettings {
    pub mode: DisplayMode,
    pub timestamps: bool,
    pub timezone: Timezone,
}

/// Cross-call formatter state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatterState {
    /// Next rendered character starts a line and gets a timestamp tag.
    pub last_line_is_start: bool,
    /// Bytes not yet forming a full hex row.
    pub hex_carry: Vec<u8>,
    /// Address of the next hex row.
    pub hex_row_offset: u64,
    /// The last emission was an unterminated, overwritable hex row.
    pub partial_row_pending: bool,
    /// Incomplete trailing UTF-8 sequence awaiting its continuation bytes.
    pub text_carry: Vec<u8>,
    /// Timestamp of the chunk that last left bytes in `text_carry`.
    pub carry_timestamp_ms: i64,
}

impl Default for FormatterState {
    fn default() -> Self {
        Self {
            last_line_is_start: true,
            hex_carry: Vec::new(),
            hex_row_offset: 0,
            partial_row_pending: false,
            text_carry: Vec::new(),
            carry_timestamp_ms: 0,
        }
    }
}

impl FormatterState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Formats chunk batches under fixed settings.
///
/// `partial_rows` says whether the output target can erase a line. Without
/// it, incomplete hex rows are held back until [`RenderFormatter::finish`].
#[derive(Debug, Clone, Copy)]
pub struct RenderFormatter {
    settings: RenderSettings,
    partial_rows: bool,
}

impl RenderFormatter {
    pub fn new(settings: RenderSettings, partial_rows: bool) -> Self {
        Self {
            settings,
            partial_rows,
        }
    }

    pub fn settings(&self) -> RenderSettings {
        self.settings
    }

    pub fn partial_rows(&self) -> bool {
        self.partial_rows
    }

    /// Render one batch, advancing `state`.
    pub fn format(&self, state: &mut FormatterState, chunks: &[Chunk]) -> String {
        match (self.settings.mode, self.settings.timestamps) {
            (DisplayMode::Text, false) => self.format_raw(state, chunks),
            (DisplayMode::Text, true) => self.format_timestamped(state, chunks),
            (DisplayMode::Hex, _) => self.format_hex(state, chunks),
        }
    }

    /// Flush what is still held in `state` at end of stream.
    pub fn finish(&self, state: &mut FormatterState) -> String {
        let mut out = String::new();
        match self.settings.mode {
            DisplayMode::Text => {
                if !state.text_carry.is_empty() {
                    state.text_carry.clear();
                    if self.settings.timestamps && state.last_line_is_start {
                        out.push_str(&self.tag(state.carry_timestamp_ms));
                    }
                    out.push(char::REPLACEMENT_CHARACTER);
                    state.last_line_is_start = false;
                }
            }
            DisplayMode::Hex => {
                if !self.partial_rows && !state.hex_carry.is_empty() {
                    out.push_str(&hex_dump_row(state.hex_row_offset, &state.hex_carry));
                    out.push_str(ROW_END);
                    state.hex_row_offset += state.hex_carry.len() as u64;
                    state.hex_carry.clear();
                }
            }
        }
        out
    }

    fn format_raw(&self, state: &mut FormatterState, chunks: &[Chunk]) -> String {
        let mut out = String::new();
        for chunk in chunks {
            decode_streaming(&mut state.text_carry, chunk.data(), &mut out);
        }
        out
    }

    fn format_timestamped(&self, state: &mut FormatterState, chunks: &[Chunk]) -> String {
        let mut out = String::new();
        let mut text = String::new();
        for chunk in chunks {
            text.clear();
            decode_streaming(&mut state.text_carry, chunk.data(), &mut text);
            if !state.text_carry.is_empty() {
                state.carry_timestamp_ms = chunk.timestamp_ms;
            }
            if text.is_empty() {
                continue;
            }

            let tag = self.tag(chunk.timestamp_ms);
            let mut start = 0;
            for nl in memchr::memchr_iter(b'\n', text.as_bytes()) {
                push_line_segment(state, &mut out, &tag, &text[start..=nl]);
                start = nl + 1;
            }
            if start < text.len() {
                push_line_segment(state, &mut out, &tag, &text[start..]);
            }
        }
        out
    }

    fn tag(&self, timestamp_ms: i64) -> String {
        format!("[{}] ", format_timestamp(timestamp_ms, self.settings.timezone))
    }

    fn format_hex(&self, state: &mut FormatterState, chunks: &[Chunk]) -> String {
        let mut out = String::new();
        let incoming: usize = chunks.iter().map(Chunk::len).sum();
        if incoming == 0 {
            return out;
        }

        if state.partial_row_pending {
            out.push_str(ERASE_LINE);
            state.partial_row_pending = false;
        }

        let mut pending = std::mem::take(&mut state.hex_carry);
        pending.reserve(incoming);
        for chunk in chunks {
            pending.extend_from_slice(chunk.data());
        }

        let mut rows = pending.chunks_exact(HEX_ROW_WIDTH);
        for row in &mut rows {
            out.push_str(&hex_dump_row(state.hex_row_offset, row));
            out.push_str(ROW_END);
            state.hex_row_offset += HEX_ROW_WIDTH as u64;
        }

        let remainder = rows.remainder();
        if !remainder.is_empty() && self.partial_rows {
            out.push_str(&hex_dump_row(state.hex_row_offset, remainder));
            state.partial_row_pending = true;
        }
        state.hex_carry = remainder.to_vec();
        out
    }
}

/// One-shot form of [`RenderFormatter::format`]: state in, output and state out.
pub fn format(
    chunks: &[Chunk],
    settings: RenderSettings,
    partial_rows: bool,
    mut state: FormatterState,
) -> (String, FormatterState) {
    let output = RenderFormatter::new(settings, partial_rows).format(&mut state, chunks);
    (output, state)
}

fn push_line_segment(state: &mut FormatterState, out: &mut String, tag: &str, segment: &str) {
    if state.last_line_is_start {
        out.push_str(tag);
    }
    out.push_str(segment);
    state.last_line_is_start = segment.ends_with('\n');
}

/// Decode `input` as UTF-8 continuing from `carry`.
///
/// Malformed sequences become U+FFFD; a truncated sequence at the end is kept
/// in `carry` for the next call.
fn decode_streaming(carry: &mut Vec<u8>, input: &[u8], out: &mut String) {
    let joined: Vec<u8>;
    let mut bytes: &[u8] = if carry.is_empty() {
        input
    } else {
        carry.extend_from_slice(input);
        joined = std::mem::take(carry);
        &joined
    };

    loop {
        match std::str::from_utf8(bytes) {
            Ok(s) => {
                out.push_str(s);
                return;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                if let Ok(s) = std::str::from_utf8(&bytes[..valid]) {
                    out.push_str(s);
                }
                match e.error_len() {
                    Some(bad) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        bytes = &bytes[valid + bad..];
                    }
                    None => {
                        carry.extend_from_slice(&bytes[valid..]);
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn settings(mode: DisplayMode, timestamps: bool) -> RenderSettings {
        RenderSettings {
            mode,
            timestamps,
            timezone: Timezone::Utc,
        }
    }

    fn chunk(ts: i64, data: &[u8]) -> Chunk {
        Chunk::new(ts, data.to_vec())
    }

    #[test]
    fn test_raw_mode_is_passthrough() {
        let f = RenderFormatter::new(settings(DisplayMode::Text, false), true);
        let mut state = FormatterState::default();
        let out = f.format(&mut state, &[chunk(0, b"hello\r\n"), chunk(1, b"world")]);
        assert_eq!(out, "hello\r\nworld");
    }

    #[test]
    fn test_split_multibyte_character_is_joined() {
        let f = RenderFormatter::new(settings(DisplayMode::Text, false), true);
        let mut state = FormatterState::default();
        let euro = "€".as_bytes();
        let first = f.format(&mut state, &[chunk(0, &euro[..1])]);
        assert_eq!(first, "");
        assert_eq!(state.text_carry, euro[..1].to_vec());
        let second = f.format(&mut state, &[chunk(1, &euro[1..])]);
        assert_eq!(second, "€");
        assert!(state.text_carry.is_empty());
    }

    #[test]
    fn test_malformed_bytes_become_replacement_glyphs() {
        let f = RenderFormatter::new(settings(DisplayMode::Text, false), true);
        let mut state = FormatterState::default();
        let out = f.format(&mut state, &[chunk(0, b"a\xFFb\xC3")]);
        assert_eq!(out, "a\u{FFFD}b");
        assert_eq!(f.finish(&mut state), "\u{FFFD}");
    }

    #[test]
    fn test_timestamp_scenario_two_chunks() {
        let f = RenderFormatter::new(settings(DisplayMode::Text, true), true);
        let mut state = FormatterState::default();
        let t0 = 1_704_164_645_000;
        let out = f.format(
            &mut state,
            &[chunk(t0, &[0x41, 0x42]), chunk(t0 + 5, &[0x0A, 0x43])],
        );
        assert_eq!(out, "[03:04:05.000] AB\n[03:04:05.005] C");
        assert!(!state.last_line_is_start);
    }

    #[test]
    fn test_trailing_newline_defers_tag_to_next_chunk() {
        let f = RenderFormatter::new(settings(DisplayMode::Text, true), true);
        let mut state = FormatterState::default();
        let t0 = 1_704_164_645_000;
        let first = f.format(&mut state, &[chunk(t0, b"ok\n")]);
        assert_eq!(first, "[03:04:05.000] ok\n");
        assert!(state.last_line_is_start);
        let second = f.format(&mut state, &[chunk(t0 + 1000, b"next")]);
        assert_eq!(second, "[03:04:06.000] next");
    }

    #[test]
    fn test_finish_tags_dangling_carry_at_line_start() {
        let f = RenderFormatter::new(settings(DisplayMode::Text, true), true);
        let mut state = FormatterState::default();
        let t0 = 1_704_164_645_000;
        let out = f.format(&mut state, &[chunk(t0, b"a\n\xC3")]);
        assert_eq!(out, "[03:04:05.000] a\n");
        assert!(state.last_line_is_start);

        assert_eq!(f.finish(&mut state), "[03:04:05.000] \u{FFFD}");
        assert!(!state.last_line_is_start);
        assert!(state.text_carry.is_empty());
    }

    #[test]
    fn test_finish_mid_line_adds_no_tag() {
        let f = RenderFormatter::new(settings(DisplayMode::Text, true), true);
        let mut state = FormatterState::default();
        let t0 = 1_704_164_645_000;
        f.format(&mut state, &[chunk(t0, b"ab"), chunk(t0 + 7, b"\xE2\x82")]);
        assert_eq!(state.carry_timestamp_ms, t0 + 7);
        assert_eq!(f.finish(&mut state), "\u{FFFD}");
    }

    #[test]
    fn test_finish_uses_timestamp_of_chunk_holding_carry() {
        let f = RenderFormatter::new(settings(DisplayMode::Text, true), true);
        let mut state = FormatterState::default();
        let t0 = 1_704_164_645_000;
        f.format(&mut state, &[chunk(t0, b"x\n"), chunk(t0 + 250, b"\xF0")]);
        assert_eq!(f.finish(&mut state), "[03:04:05.250] \u{FFFD}");
    }

    #[test]
    fn test_hex_partial_row_is_erased_and_rewritten() {
        let f = RenderFormatter::new(settings(DisplayMode::Hex, false), true);
        let mut state = FormatterState::default();

        let first = f.format(&mut state, &[chunk(0, b"0123")]);
        assert_eq!(first, hex_dump_row(0, b"0123"));
        assert!(state.partial_row_pending);
        assert_eq!(state.hex_carry, b"0123".to_vec());

        let second = f.format(&mut state, &[chunk(1, b"456789ABCDEFxy")]);
        let expected = format!(
            "{ERASE_LINE}{}{ROW_END}{}",
            hex_dump_row(0, b"0123456789ABCDEF"),
            hex_dump_row(16, b"xy")
        );
        assert_eq!(second, expected);
        assert_eq!(state.hex_row_offset, 16);
        assert_eq!(state.hex_carry, b"xy".to_vec());
    }

    #[test]
    fn test_hex_empty_batch_emits_nothing() {
        let f = RenderFormatter::new(settings(DisplayMode::Hex, false), true);
        let mut state = FormatterState::default();
        f.format(&mut state, &[chunk(0, b"ab")]);
        assert_eq!(f.format(&mut state, &[chunk(1, b"")]), "");
        assert!(state.partial_row_pending);
    }

    #[test]
    fn test_hex_without_erase_defers_partial_row_to_finish() {
        let f = RenderFormatter::new(settings(DisplayMode::Hex, false), false);
        let mut state = FormatterState::default();
        let out = f.format(&mut state, &[chunk(0, b"0123456789ABCDEFtail")]);
        assert_eq!(out, format!("{}{ROW_END}", hex_dump_row(0, b"0123456789ABCDEF")));
        assert!(!state.partial_row_pending);

        let tail = f.finish(&mut state);
        assert_eq!(tail, format!("{}{ROW_END}", hex_dump_row(16, b"tail")));
        assert!(state.hex_carry.is_empty());
    }

    #[test]
    fn test_one_shot_format_returns_state() {
        let (out, state) = format(
            &[chunk(0, b"x\n")],
            settings(DisplayMode::Text, false),
            true,
            FormatterState::default(),
        );
        assert_eq!(out, "x\n");
        assert!(state.last_line_is_start);
    }

    #[test]
    fn test_display_mode_parsing() {
        assert_eq!("HEX".parse::<DisplayMode>(), Ok(DisplayMode::Hex));
        assert!("binary".parse::<DisplayMode>().is_err());
    }
}
