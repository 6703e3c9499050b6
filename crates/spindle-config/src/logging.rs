//! Log output format for the server's stderr stream.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How log events are written to stderr.
///
/// Parsing is case-insensitive, so `SPINDLE_LOG_FORMAT=Pretty` and
/// `--log-format json` both resolve.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event with its fields flattened in.
    #[default]
    Json,
    /// One human-readable line per event.
    Compact,
    /// Multi-line events with source locations, for local debugging.
    Pretty,
}

impl LogFormat {
    /// Whether events are machine-readable.
    #[must_use]
    pub const fn is_structured(self) -> bool {
        matches!(self, Self::Json)
    }

    /// Whether events carry the source file and line of the call site.
    #[must_use]
    pub const fn shows_source_location(self) -> bool {
        matches!(self, Self::Pretty)
    }
}

/// Error returned when a [`LogFormat`] name is not recognised.
pub type LogFormatParseError = strum::ParseError;
