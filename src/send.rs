//! Manual send: typed text or a hex string turned into bytes for the port.

use crate::bytes::hex_decode;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("Invalid hex input: {0:?}")]
    InvalidHex(String),

    #[error("Nothing to send")]
    Empty,
}

/// One manual send request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualSend {
    Text {
        text: String,
        /// Expand `\r`, `\n`, `\t`, `\\`, `\0` and `\xHH` escapes.
        expand_escapes: bool,
        /// Append `\r\n` after the text.
        append_crlf: bool,
    },
    /// Hex bytes; whitespace, commas, colons, dashes and `0x` prefixes are
    /// ignored.
    Hex(String),
}

impl ManualSend {
    pub fn text(text: impl Into<String>) -> Self {
        ManualSend::Text {
            text: text.into(),
            expand_escapes: true,
            append_crlf: true,
        }
    }

    pub fn hex(input: impl Into<String>) -> Self {
        ManualSend::Hex(input.into())
    }

    /// Bytes to put on the wire. Invalid hex produces no bytes at all.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SendError> {
        match self {
            ManualSend::Text {
                text,
                expand_escapes,
                append_crlf,
            } => {
                let mut bytes = if *expand_escapes {
                    expand(text)
                } else {
                    text.as_bytes().to_vec()
                };
                if *append_crlf {
                    bytes.extend_from_slice(b"\r\n");
                }
                if bytes.is_empty() {
                    return Err(SendError::Empty);
                }
                Ok(bytes)
            }
            ManualSend::Hex(input) => match hex_decode(input) {
                Some(bytes) if bytes.is_empty() => Err(SendError::Empty),
                Some(bytes) => Ok(bytes),
                None => Err(SendError::InvalidHex(input.clone())),
            },
        }
    }
}

/// Expand backslash escapes. Unknown or truncated escapes are kept verbatim.
fn expand(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 >= bytes.len() {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let replacement = match bytes[i + 1] {
            b'r' => Some((b'\r', 2)),
            b'n' => Some((b'\n', 2)),
            b't' => Some((b'\t', 2)),
            b'0' => Some((0, 2)),
            b'\\' => Some((b'\\', 2)),
            b'x' => bytes
                .get(i + 2..i + 4)
                .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .map(|b| (b, 4)),
            _ => None,
        };
        match replacement {
            Some((byte, len)) => {
                out.push(byte);
                i += len;
            }
            None => {
                out.push(b'\\');
                i += 1;
            }
        }
    }
    out
}
