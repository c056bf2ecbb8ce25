use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Untyped status notification as emitted by a script: `(step, payload?)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStatus {
    pub step: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl RawStatus {
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            payload: None,
        }
    }

    pub fn with_payload(step: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self {
            step: step.into(),
            payload: Some(payload.into()),
        }
    }

    pub(crate) fn payload_index(&self) -> Option<usize> {
        self.payload
            .as_ref()
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
    }

    pub(crate) fn payload_text(&self) -> Option<&str> {
        self.payload.as_ref().and_then(Value::as_str)
    }
}
