use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden path: {path}")]
    Forbidden { path: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Upstream rejected the call ({status}): {message}")]
    UpstreamRejected {
        status: StatusCode,
        message: String,
        data: Option<Value>,
    },

    #[error("Upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("Upstream not responding: {0}")]
    UpstreamTimeout(String),

    #[error("Invalid upstream response: {0}")]
    InvalidUpstreamResponse(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn invalid_upstream(msg: impl Into<String>) -> Self {
        Self::InvalidUpstreamResponse(msg.into())
    }

    /// Classifies a failed outbound request that never produced a response.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::UpstreamTimeout(err.to_string())
        } else {
            Self::UpstreamUnreachable(err.to_string())
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) | Self::SessionExpired(_) => StatusCode::UNAUTHORIZED,
            Self::UpstreamRejected { status, .. } => *status,
            Self::UpstreamUnreachable(_) | Self::InvalidUpstreamResponse(_) | Self::Network(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config(_)
            | Self::Serialization(_)
            | Self::Yaml(_)
            | Self::Io(_)
            | Self::AddrParse(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message a caller is allowed to see. Local faults never leak their cause.
    pub fn public_message(&self) -> String {
        match self {
            Self::BadRequest(msg)
            | Self::Unauthorized(msg)
            | Self::SessionExpired(msg)
            | Self::NotConfigured(msg) => msg.clone(),
            Self::Forbidden { .. } => "Forbidden".to_string(),
            Self::UpstreamRejected { message, .. } => message.clone(),
            Self::UpstreamUnreachable(_) | Self::Network(_) => "Upstream unreachable".to_string(),
            Self::UpstreamTimeout(_) => "Upstream not responding".to_string(),
            Self::InvalidUpstreamResponse(_) => "Invalid response from upstream".to_string(),
            _ => "Internal server error".to_string(),
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let data = match self {
            Self::UpstreamRejected { data, .. } => data.clone(),
            _ => None,
        };
        ErrorBody {
            error: ErrorDetail {
                code: self.status().as_u16(),
                message: self.public_message(),
                data,
            },
        }
    }
}

/// Body of every error the gateway produces itself.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed with {}: {}", status, self);
        }
        (status, Json(self.to_body())).into_response()
    }
}
