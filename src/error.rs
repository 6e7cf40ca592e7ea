use std::io;
use std::path::PathBuf;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Authorization header missing or malformed")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid request body")]
    InvalidBody { detail: String },

    #[error("Invalid request body")]
    PayloadTooLarge { limit: usize },

    #[error("Invalid proxy")]
    InvalidProxy { detail: String },

    #[error("Proxy connection failed")]
    ProxyFailure { detail: String },

    #[error("Failed to read {}: {source}", .path.display())]
    File { path: PathBuf, source: io::Error },

    #[error("{message}")]
    Upstream { message: String },
}

impl GatewayError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        GatewayError::BadRequest(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        GatewayError::Upstream {
            message: message.into(),
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            GatewayError::InvalidBody { detail }
            | GatewayError::InvalidProxy { detail }
            | GatewayError::ProxyFailure { detail } => Some(detail.clone()),
            GatewayError::PayloadTooLarge { limit } => {
                Some(format!("body exceeds the {limit} byte limit"))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::BadRequest(_)
            | GatewayError::InvalidBody { .. }
            | GatewayError::InvalidProxy { .. }
            | GatewayError::ProxyFailure { .. } => StatusCode::BAD_REQUEST,
            GatewayError::File { .. } | GatewayError::Upstream { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let code = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
            detail: self.detail(),
        };

        if code.is_server_error() {
            tracing::error!(status = code.as_u16(), detail = ?body.detail, "{}", body.error);
        } else {
            tracing::warn!(status = code.as_u16(), detail = ?body.detail, "{}", body.error);
        }

        HttpResponse::build(code).json(body)
    }
}
