//! Structured requests produced by the session parsers.
//!
//! A request is only ever constructed from non-empty input: parsers return
//! `None` rather than a request with an empty command.

use std::fmt;

use serde_json::{Map, Number, Value};

/// Request handed to the render pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Raw text passed through unchanged.
    PlainText(PlainTextRequest),
    /// Shell-style command line.
    Shell(ShellRequest),
    /// Command followed by a decoded serialised payload.
    Serialized(SerializedRequest),
}

impl Request {
    /// Returns the command identifier.
    ///
    /// Plain-text requests use their trimmed body as the command.
    #[must_use]
    pub fn command(&self) -> &str {
        match self {
            Self::PlainText(request) => request.text().trim(),
            Self::Shell(request) => request.command(),
            Self::Serialized(request) => request.command(),
        }
    }
}

impl From<PlainTextRequest> for Request {
    fn from(request: PlainTextRequest) -> Self {
        Self::PlainText(request)
    }
}

impl From<ShellRequest> for Request {
    fn from(request: ShellRequest) -> Self {
        Self::Shell(request)
    }
}

impl From<SerializedRequest> for Request {
    fn from(request: SerializedRequest) -> Self {
        Self::Serialized(request)
    }
}

/// Request wrapping the received text verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainTextRequest {
    text: String,
}

impl PlainTextRequest {
    /// Wraps received bytes, returning `None` when they hold no visible text.
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(bytes);
        if text.trim().is_empty() {
            return None;
        }
        Some(Self {
            text: text.into_owned(),
        })
    }

    /// Received text, including any trailing newline.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Command line split into a command and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellRequest {
    command: String,
    arguments: Vec<String>,
}

impl ShellRequest {
    /// Builds a shell request; `None` when the command is empty.
    #[must_use]
    pub fn new(command: impl Into<String>, arguments: Vec<String>) -> Option<Self> {
        let command = command.into();
        if command.is_empty() {
            return None;
        }
        Some(Self { command, arguments })
    }

    /// Command token.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Arguments in the order they appeared.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }
}

impl fmt::Display for ShellRequest {
    /// Rejoins the command and arguments with single spaces.
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.command)?;
        for argument in &self.arguments {
            write!(formatter, " {argument}")?;
        }
        Ok(())
    }
}

/// Command followed by a decoded argument structure.
#[derive(Debug, Clone, PartialEq)]
pub struct SerializedRequest {
    command: String,
    arguments: Vec<(MapKey, SerializedValue)>,
}

impl SerializedRequest {
    /// Builds a serialised request; `None` when the command is empty.
    #[must_use]
    pub fn new(
        command: impl Into<String>,
        arguments: Vec<(MapKey, SerializedValue)>,
    ) -> Option<Self> {
        let command = command.into();
        if command.is_empty() {
            return None;
        }
        Some(Self { command, arguments })
    }

    /// Command token.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Decoded arguments in payload order.
    #[must_use]
    pub fn arguments(&self) -> &[(MapKey, SerializedValue)] {
        &self.arguments
    }

    /// Looks up an argument by key.
    #[must_use]
    pub fn argument(&self, key: &MapKey) -> Option<&SerializedValue> {
        self.arguments
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value)
    }

    /// Arguments as a JSON object in payload order.
    #[must_use]
    pub fn arguments_json(&self) -> Value {
        Value::Object(entries_to_json(&self.arguments))
    }
}

/// Value decoded from the length/type-tagged serialisation grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum SerializedValue {
    /// `N;`
    Null,
    /// `b:0;` or `b:1;`
    Bool(bool),
    /// `i:<digits>;`
    Int(i64),
    /// `d:<float>;`
    Float(f64),
    /// `s:<len>:"<bytes>";`
    String(String),
    /// `a:<count>:{...}` with entries in payload order.
    Map(Vec<(MapKey, SerializedValue)>),
}

impl SerializedValue {
    /// Converts the value into JSON.
    ///
    /// Map keys become strings. Non-finite floats have no JSON form and map
    /// to `null`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(flag) => Value::Bool(*flag),
            Self::Int(number) => Value::from(*number),
            Self::Float(number) => Number::from_f64(*number).map_or(Value::Null, Value::Number),
            Self::String(text) => Value::String(text.clone()),
            Self::Map(entries) => Value::Object(entries_to_json(entries)),
        }
    }
}

fn entries_to_json(entries: &[(MapKey, SerializedValue)]) -> Map<String, Value> {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_json()))
        .collect()
}

/// Key of a serialised map entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    /// Integer key.
    Int(i64),
    /// String key.
    Str(String),
}

impl From<i64> for MapKey {
    fn from(key: i64) -> Self {
        Self::Int(key)
    }
}

impl From<&str> for MapKey {
    fn from(key: &str) -> Self {
        Self::Str(key.to_owned())
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(key) => write!(formatter, "{key}"),
            Self::Str(key) => formatter.write_str(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_rejects_blank_input() {
        assert!(PlainTextRequest::from_bytes(b"").is_none());
        assert!(PlainTextRequest::from_bytes(b" \r\n\t").is_none());
    }

    #[test]
    fn plain_text_command_is_trimmed_body() {
        let request = Request::from(PlainTextRequest::from_bytes(b"status\n").expect("request"));
        assert_eq!(request.command(), "status");
    }

    #[test]
    fn shell_request_requires_command() {
        assert!(ShellRequest::new("", vec!["x".to_owned()]).is_none());
    }

    #[test]
    fn shell_request_display_rejoins_arguments() {
        let request = ShellRequest::new("deploy", vec!["app1".to_owned(), "--force".to_owned()])
            .expect("request");
        assert_eq!(request.to_string(), "deploy app1 --force");
    }

    #[test]
    fn serialized_values_convert_to_json() {
        let value = SerializedValue::Map(vec![
            (MapKey::Int(0), SerializedValue::Float(f64::NAN)),
            (MapKey::from("name"), SerializedValue::String("x".to_owned())),
        ]);
        assert_eq!(value.to_json(), serde_json::json!({"0": null, "name": "x"}));
    }

    #[test]
    fn serialized_request_looks_up_arguments() {
        let request = SerializedRequest::new(
            "set",
            vec![(MapKey::from("key"), SerializedValue::Int(4))],
        )
        .expect("request");
        assert_eq!(
            request.argument(&MapKey::from("key")),
            Some(&SerializedValue::Int(4))
        );
        assert_eq!(request.argument(&MapKey::Int(0)), None);
    }
}
