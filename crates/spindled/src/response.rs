//! Responses produced by the render pipeline and their wire encodings.
//!
//! Every variant encodes without framing: plain text is written as-is, byte
//! responses verbatim, and JSON responses as compact text. An empty JSON
//! value encodes as `[]` regardless of whether it started as an array or an
//! object.

use serde_json::{Map, Value};

/// Response threaded through the render pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Text written unchanged.
    PlainText(String),
    /// Raw bytes written unchanged.
    Bytes(Vec<u8>),
    /// Structured value written as compact JSON.
    Json(JsonResponse),
}

impl Response {
    /// Builds a plain-text response.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::PlainText(text.into())
    }

    /// Builds a byte response.
    #[must_use]
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(bytes.into())
    }

    /// Encodes the response for the wire.
    ///
    /// Returns `None` only when a JSON value cannot be encoded.
    #[must_use]
    pub fn payload(&self) -> Option<Vec<u8>> {
        match self {
            Self::PlainText(text) => Some(text.as_bytes().to_vec()),
            Self::Bytes(bytes) => Some(bytes.clone()),
            Self::Json(json) => json.encode().ok().map(String::into_bytes),
        }
    }
}

impl From<JsonResponse> for Response {
    fn from(response: JsonResponse) -> Self {
        Self::Json(response)
    }
}

/// Mutable JSON document preserving key insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonResponse {
    data: Value,
}

impl Default for JsonResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonResponse {
    /// Creates an empty response, encoded as `[]`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: Value::Array(Vec::new()),
        }
    }

    /// Wraps an existing JSON value.
    #[must_use]
    pub const fn from_value(data: Value) -> Self {
        Self { data }
    }

    /// Borrow of the underlying value.
    #[must_use]
    pub const fn data(&self) -> &Value {
        &self.data
    }

    /// Consumes the response and returns the underlying value.
    #[must_use]
    pub fn into_data(self) -> Value {
        self.data
    }

    /// Mutable access to an element by array index or object key.
    pub fn get_mut<I: serde_json::value::Index>(&mut self, index: I) -> Option<&mut Value> {
        self.data.get_mut(index)
    }

    /// Replaces the element at `index`, returning the previous value.
    ///
    /// Returns `None` and leaves the document untouched when the index is out
    /// of range or the document is not an array.
    pub fn set_index(&mut self, index: usize, value: impl Into<Value>) -> Option<Value> {
        let slot = self.data.as_array_mut()?.get_mut(index)?;
        Some(std::mem::replace(slot, value.into()))
    }

    /// Appends a value to an array document.
    ///
    /// An empty object or `null` document becomes an array first; appending to
    /// a non-empty object stores the value under the next free integer key.
    pub fn push(&mut self, value: impl Into<Value>) {
        let value = value.into();
        match &mut self.data {
            Value::Array(items) => items.push(value),
            Value::Object(map) if !map.is_empty() => {
                let key = next_integer_key(map);
                map.insert(key, value);
            }
            other => *other = Value::Array(vec![value]),
        }
    }

    /// Inserts a keyed entry, keeping insertion order.
    ///
    /// An empty array or `null` document becomes an object first; a non-empty
    /// array is converted to an object keyed by position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        if !self.data.is_object() {
            self.data = Value::Object(positional_object(&mut self.data));
        }
        self.data
            .as_object_mut()
            .and_then(|map| map.insert(key.into(), value.into()))
    }

    /// Encodes the document as compact JSON.
    ///
    /// # Errors
    ///
    /// Returns the encoder error when the value cannot be serialised.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        if is_empty_collection(&self.data) {
            return Ok("[]".to_owned());
        }
        serde_json::to_string(&self.data)
    }
}

impl From<Value> for JsonResponse {
    fn from(data: Value) -> Self {
        Self::from_value(data)
    }
}

fn is_empty_collection(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Null => true,
        Value::Bool(_) | Value::Number(_) | Value::String(_) => false,
    }
}

fn positional_object(value: &mut Value) -> Map<String, Value> {
    match value.take() {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn next_integer_key(map: &Map<String, Value>) -> String {
    map.keys()
        .filter_map(|key| key.parse::<u64>().ok())
        .max()
        .map_or(0, |max| max.saturating_add(1))
        .to_string()
}
