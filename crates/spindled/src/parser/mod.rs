//! Request parsers that turn received bytes into structured requests.
//!
//! Parsers are stateless and shared between sessions. Returning `None` means
//! the input is not a request: empty, blank, or malformed input never yields
//! a request with an empty command.

mod serialized;
mod shell;

use std::sync::Arc;

use spindle_config::ParserKind;

use crate::request::{PlainTextRequest, Request};

pub use self::serialized::{DecodeError, SerializedRequestParser, decode_value};
pub use self::shell::ShellRequestParser;

/// Converts a received buffer into a request.
pub trait RequestParser: Send + Sync {
    /// Parses `data`, returning `None` when it is not a valid request.
    fn parse_request(&self, data: &[u8]) -> Option<Request>;
}

impl<T> RequestParser for Arc<T>
where
    T: RequestParser + ?Sized,
{
    fn parse_request(&self, data: &[u8]) -> Option<Request> {
        (**self).parse_request(data)
    }
}

/// Parser wrapping the received text in a [`PlainTextRequest`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextRequestParser;

impl RequestParser for PlainTextRequestParser {
    fn parse_request(&self, data: &[u8]) -> Option<Request> {
        PlainTextRequest::from_bytes(data).map(Request::PlainText)
    }
}

/// Builds the shared parser for a configured [`ParserKind`].
#[must_use]
pub fn parser_for(kind: ParserKind) -> Arc<dyn RequestParser> {
    match kind {
        ParserKind::Plain => Arc::new(PlainTextRequestParser),
        ParserKind::Shell => Arc::new(ShellRequestParser),
        ParserKind::Serialized => Arc::new(SerializedRequestParser),
    }
}
