//! Command token followed by a length/type-tagged serialised payload.
//!
//! The payload grammar is the PHP `serialize` format restricted to scalars
//! and arrays:
//!
//! ```text
//! N;                       null
//! b:1;                     boolean
//! i:-42;                   integer
//! d:0.5;                   float (also INF, -INF, NAN)
//! s:5:"hello";             string with its byte length
//! a:2:{i:0;N;s:1:"k";b:0;} ordered map with its entry count
//! ```

use thiserror::Error;

use crate::request::{MapKey, Request, SerializedRequest, SerializedValue};

use super::RequestParser;

const MAX_DEPTH: usize = 64;

/// Parses `command <payload>` requests.
///
/// A payload that fails to decode is discarded and the command is returned
/// with no arguments.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerializedRequestParser;

impl RequestParser for SerializedRequestParser {
    fn parse_request(&self, data: &[u8]) -> Option<Request> {
        let text = String::from_utf8_lossy(data);
        let (command, payload) = split_command(text.trim());
        let arguments = match payload {
            Payload::Decoded(value) => into_arguments(value),
            Payload::Raw(raw) if raw.is_empty() => Vec::new(),
            Payload::Raw(raw) => match decode_value(raw.as_bytes()) {
                Ok(value) => into_arguments(value),
                Err(error) => {
                    tracing::debug!(
                        target: crate::session::SESSION_TARGET,
                        command,
                        error = %error,
                        "discarding undecodable payload"
                    );
                    Vec::new()
                }
            },
        };
        SerializedRequest::new(command, arguments).map(Request::Serialized)
    }
}

enum Payload<'a> {
    Decoded(SerializedValue),
    Raw(&'a str),
}

/// Splits at the first whitespace, or inside the token where the first
/// glued value marker starts a complete serialised value.
///
/// Only the first marker is tried, keeping the split linear in the input.
fn split_command(input: &str) -> (&str, Payload<'_>) {
    let mut marker_tried = false;
    for (index, ch) in input.char_indices() {
        if ch.is_whitespace() {
            let (command, rest) = input.split_at(index);
            return (command, Payload::Raw(rest.trim()));
        }
        if index == 0 || marker_tried {
            continue;
        }
        let (command, rest) = input.split_at(index);
        if looks_like_value(rest.as_bytes()) {
            marker_tried = true;
            if let Ok(value) = decode_value(rest.as_bytes()) {
                return (command, Payload::Decoded(value));
            }
        }
    }
    (input, Payload::Raw(""))
}

fn looks_like_value(bytes: &[u8]) -> bool {
    match bytes {
        [b'N', b';', ..] => true,
        [b'a' | b'b' | b'd' | b'i' | b's', b':', next, ..] => {
            next.is_ascii_digit() || matches!(next, b'-' | b'+' | b'I' | b'N')
        }
        _ => false,
    }
}

fn into_arguments(value: SerializedValue) -> Vec<(MapKey, SerializedValue)> {
    match value {
        SerializedValue::Map(entries) => entries,
        SerializedValue::Null => Vec::new(),
        scalar => vec![(MapKey::Int(0), scalar)],
    }
}

/// Errors raised while decoding a serialised payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Input ended before the value was complete.
    #[error("unexpected end of payload at byte {offset}")]
    UnexpectedEnd {
        /// Byte offset where more input was expected.
        offset: usize,
    },
    /// A structural byte did not match the grammar.
    #[error("expected '{expected}' at byte {offset}")]
    Expected {
        /// Byte offset of the mismatch.
        offset: usize,
        /// Character the grammar required.
        expected: char,
    },
    /// The type tag is not supported.
    #[error("unsupported type tag '{tag}' at byte {offset}")]
    UnknownTag {
        /// Byte offset of the tag.
        offset: usize,
        /// Tag character.
        tag: char,
    },
    /// A numeric field could not be parsed.
    #[error("invalid number at byte {offset}")]
    InvalidNumber {
        /// Byte offset where the number starts.
        offset: usize,
    },
    /// A map key was neither an integer nor a string.
    #[error("invalid map key at byte {offset}")]
    InvalidKey {
        /// Byte offset of the key.
        offset: usize,
    },
    /// String bytes were not valid UTF-8.
    #[error("string at byte {offset} is not valid UTF-8")]
    InvalidUtf8 {
        /// Byte offset where the string contents start.
        offset: usize,
    },
    /// Bytes remained after the top-level value.
    #[error("trailing data at byte {offset}")]
    TrailingData {
        /// Byte offset of the first unconsumed byte.
        offset: usize,
    },
    /// Maps were nested beyond the supported depth.
    #[error("payload nests deeper than {MAX_DEPTH} levels")]
    TooDeep,
}

/// Decodes one complete serialised value from `input`.
///
/// # Errors
///
/// Returns a [`DecodeError`] when the input is malformed, uses an
/// unsupported tag, or has bytes left over after the value.
pub fn decode_value(input: &[u8]) -> Result<SerializedValue, DecodeError> {
    let mut decoder = Decoder { input, offset: 0 };
    let value = decoder.value(0)?;
    if decoder.offset < input.len() {
        return Err(DecodeError::TrailingData {
            offset: decoder.offset,
        });
    }
    Ok(value)
}

struct Decoder<'a> {
    input: &'a [u8],
    offset: usize,
}

impl<'a> Decoder<'a> {
    fn value(&mut self, depth: usize) -> Result<SerializedValue, DecodeError> {
        let start = self.offset;
        match self.next()? {
            b'N' => {
                self.expect(b';')?;
                Ok(SerializedValue::Null)
            }
            b'b' => {
                self.expect(b':')?;
                let flag = self.field(b';')?;
                match flag {
                    b"0" => Ok(SerializedValue::Bool(false)),
                    b"1" => Ok(SerializedValue::Bool(true)),
                    _ => Err(DecodeError::InvalidNumber { offset: start + 2 }),
                }
            }
            b'i' => {
                self.expect(b':')?;
                let number = self.integer(b';')?;
                Ok(SerializedValue::Int(number))
            }
            b'd' => {
                self.expect(b':')?;
                let number = self.float()?;
                Ok(SerializedValue::Float(number))
            }
            b's' => {
                self.expect(b':')?;
                self.string().map(SerializedValue::String)
            }
            b'a' => {
                if depth >= MAX_DEPTH {
                    return Err(DecodeError::TooDeep);
                }
                self.expect(b':')?;
                self.map(depth).map(SerializedValue::Map)
            }
            tag => Err(DecodeError::UnknownTag {
                offset: start,
                tag: char::from(tag),
            }),
        }
    }

    fn map(&mut self, depth: usize) -> Result<Vec<(MapKey, SerializedValue)>, DecodeError> {
        let count_offset = self.offset;
        let count = usize::try_from(self.integer(b':')?)
            .map_err(|_| DecodeError::InvalidNumber {
                offset: count_offset,
            })?;
        self.expect(b'{')?;
        // Every entry takes at least four bytes (`i:0;` key plus `N;` value
        // minus shared punctuation), so the remaining input bounds the count.
        let remaining = self.input.len().saturating_sub(self.offset);
        let mut entries = Vec::with_capacity(count.min(remaining / 4));
        for _ in 0..count {
            let key = self.key()?;
            let value = self.value(depth + 1)?;
            entries.push((key, value));
        }
        self.expect(b'}')?;
        Ok(entries)
    }

    fn key(&mut self) -> Result<MapKey, DecodeError> {
        let start = self.offset;
        match self.next()? {
            b'i' => {
                self.expect(b':')?;
                self.integer(b';').map(MapKey::Int)
            }
            b's' => {
                self.expect(b':')?;
                self.string().map(MapKey::Str)
            }
            _ => Err(DecodeError::InvalidKey { offset: start }),
        }
    }

    /// Reads `<len>:"<bytes>";` after the `s:` prefix.
    fn string(&mut self) -> Result<String, DecodeError> {
        let length_offset = self.offset;
        let length = usize::try_from(self.integer(b':')?)
            .map_err(|_| DecodeError::InvalidNumber {
                offset: length_offset,
            })?;
        self.expect(b'"')?;
        let start = self.offset;
        let end = start
            .checked_add(length)
            .filter(|end| *end <= self.input.len())
            .ok_or(DecodeError::UnexpectedEnd {
                offset: self.input.len(),
            })?;
        let bytes = self
            .input
            .get(start..end)
            .ok_or(DecodeError::UnexpectedEnd { offset: start })?;
        let text = std::str::from_utf8(bytes)
            .map_err(|_| DecodeError::InvalidUtf8 { offset: start })?
            .to_owned();
        self.offset = end;
        self.expect(b'"')?;
        self.expect(b';')?;
        Ok(text)
    }

    fn integer(&mut self, terminator: u8) -> Result<i64, DecodeError> {
        let start = self.offset;
        let digits = self.field(terminator)?;
        std::str::from_utf8(digits)
            .ok()
            .and_then(|text| text.parse::<i64>().ok())
            .ok_or(DecodeError::InvalidNumber { offset: start })
    }

    fn float(&mut self) -> Result<f64, DecodeError> {
        let start = self.offset;
        let text = self.field(b';')?;
        match text {
            b"INF" => Ok(f64::INFINITY),
            b"-INF" => Ok(f64::NEG_INFINITY),
            b"NAN" => Ok(f64::NAN),
            _ => std::str::from_utf8(text)
                .ok()
                .and_then(|value| value.parse::<f64>().ok())
                .ok_or(DecodeError::InvalidNumber { offset: start }),
        }
    }

    /// Returns the bytes up to `terminator` and consumes the terminator.
    fn field(&mut self, terminator: u8) -> Result<&'a [u8], DecodeError> {
        let rest = self.input.get(self.offset..).unwrap_or_default();
        let length = rest
            .iter()
            .position(|byte| *byte == terminator)
            .ok_or(DecodeError::UnexpectedEnd {
                offset: self.input.len(),
            })?;
        let start = self.offset;
        self.offset = start + length + 1;
        self.input
            .get(start..start + length)
            .ok_or(DecodeError::UnexpectedEnd { offset: start })
    }

    fn next(&mut self) -> Result<u8, DecodeError> {
        let byte = *self
            .input
            .get(self.offset)
            .ok_or(DecodeError::UnexpectedEnd {
                offset: self.offset,
            })?;
        self.offset += 1;
        Ok(byte)
    }

    fn expect(&mut self, expected: u8) -> Result<(), DecodeError> {
        let offset = self.offset;
        if self.next()? == expected {
            Ok(())
        } else {
            Err(DecodeError::Expected {
                offset,
                expected: char::from(expected),
            })
        }
    }
}
