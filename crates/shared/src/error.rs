use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ModifiableParameter;

/// Local pre-flight failures. These never reach the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("unknown {field} option: {value:?}")]
    UnknownOption { field: &'static str, value: String },
    #[error("unknown parameter: {0:?}")]
    UnknownParameter(String),
    #[error("{value:?} is not an allowed value for {parameter}")]
    ValueOutOfDomain {
        parameter: ModifiableParameter,
        value: String,
    },
}

/// Error body returned by the generation backend.
///
/// Handler failures carry a plain string; request validation failures carry a
/// list of field errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Fields(Vec<FieldError>),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(default)]
    pub loc: Vec<serde_json::Value>,
    pub msg: String,
}

impl ErrorBody {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: ErrorDetail::Message(detail.into()),
        }
    }

    /// Flattens the detail into one human-readable line, if it has any text.
    pub fn message(&self) -> Option<String> {
        match &self.detail {
            ErrorDetail::Message(message) => {
                let message = message.trim();
                (!message.is_empty()).then(|| message.to_string())
            }
            ErrorDetail::Fields(fields) => {
                let joined = fields
                    .iter()
                    .map(FieldError::describe)
                    .collect::<Vec<_>>()
                    .join("; ");
                (!joined.is_empty()).then_some(joined)
            }
            ErrorDetail::Other(serde_json::Value::Null) => None,
            ErrorDetail::Other(value) => Some(value.to_string()),
        }
    }
}

impl FieldError {
    fn describe(&self) -> String {
        let path = self
            .loc
            .iter()
            .filter_map(|segment| match segment {
                serde_json::Value::String(s) if s != "body" => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(".");
        if path.is_empty() {
            self.msg.clone()
        } else {
            format!("{path}: {}", self.msg)
        }
    }
}
