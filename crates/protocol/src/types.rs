use crate::errors::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named control message exchanged as a text frame.
///
/// Wire shape is `{"name": <string>, "value": <any, optional>}`. Replies from
/// the backend may additionally carry an `error` string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlMessage {
    /// Message without a payload, e.g. an enumeration request.
    pub fn request(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            error: None,
        }
    }

    pub fn with_value(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
            error: None,
        }
    }

    /// Parse a text frame.
    ///
    /// Invalid JSON is an error. Well-formed JSON that is not an object or
    /// lacks a string `name` yields `Ok(None)`.
    pub fn parse(raw: &str) -> Result<Option<Self>, ProtocolError> {
        let root: Value = serde_json::from_str(raw)?;

        let Value::Object(mut fields) = root else {
            return Ok(None);
        };
        let Some(Value::String(name)) = fields.remove("name") else {
            return Ok(None);
        };

        let value = fields.remove("value");
        let error = match fields.remove("error") {
            Some(Value::String(e)) => Some(e),
            _ => None,
        };

        Ok(Some(Self { name, value, error }))
    }

    pub fn to_text(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    #[serde(alias = "w")]
    pub width: u32,
    #[serde(alias = "h")]
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parse `"640x480"`.
    pub fn parse(s: &str) -> Option<Self> {
        let (w, h) = s.trim().split_once(['x', 'X'])?;
        Some(Self::new(w.trim().parse().ok()?, h.trim().parse().ok()?))
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Capture device as reported by `camera-devices-get`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Device {
    #[serde(alias = "device")]
    pub id: String,
    #[serde(rename = "name", alias = "card", alias = "displayName")]
    pub display_name: String,
    #[serde(default)]
    pub resolutions: Vec<Resolution>,
}

impl Device {
    /// Full replacement list, or `None` when the payload is missing, empty or
    /// any entry is malformed.
    pub fn list_from_value(value: Option<&Value>) -> Option<Vec<Device>> {
        non_empty(Vec::<Device>::deserialize(value?).ok()?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub name: String,
}

impl Model {
    /// Accepts `["yolov3", ...]`, `[{"name": "yolov3"}, ...]` or
    /// `{"models": [...]}`.
    pub fn list_from_value(value: Option<&Value>) -> Option<Vec<Model>> {
        let entries = match value? {
            Value::Array(entries) => entries,
            Value::Object(fields) => fields.get("models")?.as_array()?,
            _ => return None,
        };

        let models = entries
            .iter()
            .map(|entry| {
                let name = match entry {
                    Value::String(name) => name.as_str(),
                    Value::Object(fields) => fields.get("name")?.as_str()?,
                    _ => return None,
                };
                Some(Model {
                    name: name.to_string(),
                })
            })
            .collect::<Option<Vec<_>>>()?;

        non_empty(models)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    #[serde(alias = "w")]
    pub width: f32,
    #[serde(alias = "h")]
    pub height: f32,
}

/// One labelled box produced by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f32>,
}

impl Detection {
    /// Whole result list, or `None` when the payload is not a well-formed
    /// array of detections. An empty array is valid.
    pub fn list_from_value(value: Option<&Value>) -> Option<Vec<Detection>> {
        Vec::<Detection>::deserialize(value?).ok()
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() { None } else { Some(items) }
}
