//! Handler results and their HTTP mapping.
//!
//! # Design Decisions
//! - Success always answers 200 with the handler's bytes
//! - Errors answer the status they carry, 500 when they carry none
//! - Error bodies are JSON and include the request id when present

use axum::{
    body::Bytes,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Successful handler output.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub data: Bytes,
    pub content_type: Option<HeaderValue>,
}

impl HttpResponse {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            content_type: None,
        }
    }

    /// Serialize `value` as a JSON body.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, HttpError> {
        let data = serde_json::to_vec(value).map_err(|e| HttpError::internal(e.to_string()))?;
        Ok(Self {
            data: data.into(),
            content_type: Some(HeaderValue::from_static("application/json")),
        })
    }

    pub fn with_content_type(mut self, content_type: HeaderValue) -> Self {
        self.content_type = Some(content_type);
        self
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::OK, self.data).into_response();
        if let Some(content_type) = self.content_type {
            response.headers_mut().insert(header::CONTENT_TYPE, content_type);
        }
        response
    }
}

/// Handler failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct HttpError {
    pub status: Option<StatusCode>,
    pub message: String,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message).with_status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn status_code(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<&'a str>,
}

/// Build the error response for a failed handler.
pub fn error_response(err: &HttpError, request_id: Option<&str>) -> Response {
    let status = err.status_code();
    tracing::warn!(status = %status, request_id = request_id.unwrap_or("unknown"), error = %err, "Handler failed");
    (
        status,
        Json(ErrorBody {
            error: &err.message,
            request_id,
        }),
    )
        .into_response()
}
