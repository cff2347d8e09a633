use std::time::Duration;

use shared::{domain::ShotId, error::ValidationError};
use thiserror::Error;

use crate::session::SessionPhase;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("request to {endpoint} timed out after {}s", .timeout.as_secs())]
    Timeout { endpoint: String, timeout: Duration },
    #[error("transport failure calling {endpoint}: {message}")]
    Transport { endpoint: String, message: String },
    #[error("backend returned HTTP {status} for {endpoint}{}", detail_suffix(.detail))]
    Backend {
        endpoint: String,
        status: u16,
        detail: Option<String>,
    },
    #[error("malformed response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|detail| format!(": {detail}"))
        .unwrap_or_default()
}

impl ClientError {
    /// Whether a fresh, user-initiated attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Timeout { .. } | ClientError::Transport { .. } => true,
            ClientError::Backend { status, .. } => *status >= 500 || matches!(status, 408 | 429),
            ClientError::Validation(_) | ClientError::Decode { .. } | ClientError::InvalidUrl { .. } => {
                false
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            ClientError::Backend { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Message for a notification: backend detail verbatim when present,
    /// validation text for local failures, otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ClientError::Backend {
                detail: Some(detail),
                ..
            } => detail.clone(),
            ClientError::Validation(err) => err.to_string(),
            ClientError::Timeout { .. } => format!("{fallback} (request timed out, please retry)"),
            _ => fallback.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("another operation is in flight ({0})")]
    Busy(SessionPhase),
    #[error("no active shot selected")]
    NoActiveShot,
    #[error("shot {0} is not in the library")]
    UnknownShot(ShotId),
    #[error(transparent)]
    Remote(#[from] ClientError),
}

impl SessionError {
    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Busy(_) => true,
            SessionError::Remote(err) => err.is_retryable(),
            SessionError::Validation(_) | SessionError::NoActiveShot | SessionError::UnknownShot(_) => {
                false
            }
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SessionError::Validation(_) | SessionError::Remote(ClientError::Validation(_))
        )
    }
}
