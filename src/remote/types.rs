//! Value shapes exchanged with a remote Space.
//!
//! Remote results arrive as a JSON array of outputs. A single output is
//! surfaced as `Prediction::Single`, several as `Prediction::Tuple`, which
//! mirrors how callers of these Spaces usually see them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type tag Gradio puts on file payloads.
pub const FILE_DATA_TYPE: &str = "gradio.FileData";

/// Result of one remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    /// Exactly one output value
    Single(Value),
    /// Zero or several output values, in declaration order
    Tuple(Vec<Value>),
}

impl Prediction {
    /// Shape a raw outputs array the way callers expect it.
    pub fn from_outputs(mut outputs: Vec<Value>) -> Self {
        if outputs.len() == 1 {
            Prediction::Single(outputs.remove(0))
        } else {
            Prediction::Tuple(outputs)
        }
    }

    /// Convenience for a single string output.
    pub fn text(value: impl Into<String>) -> Self {
        Prediction::Single(Value::String(value.into()))
    }
}

/// Short name for the JSON type of `value`, used in error messages.
pub fn describe_shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMeta {
    #[serde(rename = "_type")]
    pub kind: String,
}

impl Default for FileMeta {
    fn default() -> Self {
        Self {
            kind: FILE_DATA_TYPE.to_string(),
        }
    }
}

/// A file that lives on the remote Space, either uploaded by us or produced
/// as an output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Server-side path
    pub path: String,
    /// Download URL, present on outputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orig_name: Option<String>,
    #[serde(default)]
    pub meta: FileMeta,
}

impl RemoteFile {
    /// Reference to a file we uploaded, suitable as a call argument.
    pub fn uploaded(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            url: None,
            orig_name: None,
            meta: FileMeta::default(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Recognize a file payload inside a remote output.
    ///
    /// Accepts objects tagged with the Gradio file type, and untagged objects
    /// that carry both a `path` and a `url` (older Spaces omit `meta`).
    pub fn from_output(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let tagged = obj
            .get("meta")
            .and_then(|m| m.get("_type"))
            .and_then(Value::as_str)
            == Some(FILE_DATA_TYPE);
        let untagged = obj.get("path").map_or(false, Value::is_string)
            && obj.get("url").map_or(false, Value::is_string);
        if !tagged && !untagged {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// File name to use when saving a local copy.
    pub fn file_name(&self) -> String {
        self.orig_name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| {
                self.path
                    .rsplit(['/', '\\'])
                    .next()
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "output".to_string())
    }
}
