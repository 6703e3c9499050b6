use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Request parser installed on every accepted session.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ParserKind {
    /// Pass the received bytes through as a plain-text request.
    Plain,
    /// Shell-style tokenizer with quoting and backslash escapes.
    #[default]
    Shell,
    /// Command token followed by a length-prefixed serialised payload.
    Serialized,
}
