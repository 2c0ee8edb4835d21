// Unified response system for consistent API responses
// Provides HandlerResponse and the middleware that wraps every response in the same envelope

use axum::{
    body::{Body, Bytes},
    http::{
        header::CONTENT_TYPE, HeaderValue, Request, Response,
        response::Parts, StatusCode,
    },
    Json,
    middleware::Next,
    response::IntoResponse,
};
use http_body_util::BodyExt;
use tracing::{error, info};
use std::convert::Infallible;
use serde_json::Value;
use serde::{Serialize, Deserialize};
use crate::utils::formatting::to_two_space_indented_json;

/// Bodies longer than this are not reused as the envelope message
const MAX_MESSAGE_BODY_BYTES: usize = 1024;

/// Standard JSON envelope for every endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    pub status_code: u16,
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Convenience struct for building responses in handlers
#[derive(Debug, Clone)]
pub struct HandlerResponse {
    pub status_code: StatusCode,
    pub data: Option<Value>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl HandlerResponse {
    /// Creates a new response with specified status code
    pub fn new(status_code: StatusCode) -> Self {
        Self {
            status_code,
            data: None,
            message: None,
            error: None,
        }
    }

    /// Adds JSON data payload to the response
    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Sets the human readable message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attaches the underlying error text
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    fn format(&self) -> ResponseFormat {
        ResponseFormat {
            status_code: self.status_code.as_u16(),
            status: self.status_code.is_success(),
            message: self.message.clone(),
            data: self.data.clone(),
            error: self.error.clone(),
        }
    }
}

impl IntoResponse for HandlerResponse {
    fn into_response(self) -> axum::response::Response {
        let mut response: Response<Body> = Json(self.format()).into_response();

        *response.status_mut() = self.status_code;

        // Marks the response as already enveloped for the wrapper middleware
        response.extensions_mut().insert(self);
        response
    }
}

/// Logs the formatted response with proper JSON indentation
fn log_formatted_response(wrapped: &ResponseFormat) {
    match to_two_space_indented_json(wrapped) {
        Ok(spaced_json) => info!("\nFinal response:\n{}", spaced_json),
        Err(err) => error!("Failed to format response JSON: {:?}", err),
    }
}

/// Picks a message for responses produced outside the handlers (404, 408, 413, rejections)
fn message_from_body(parts: &Parts, body: &Bytes) -> String {
    let text: &str = std::str::from_utf8(body).unwrap_or("").trim();

    if !text.is_empty() && text.len() <= MAX_MESSAGE_BODY_BYTES {
        return text.to_string();
    }

    parts.status
        .canonical_reason()
        .unwrap_or("Unknown status")
        .to_string()
}

/// Builds the final response with JSON content type
fn build_final_response(mut parts: Parts, wrapped: &ResponseFormat) -> Response<Body> {
    let json_body: Vec<u8> = serde_json::to_vec(wrapped).unwrap_or_else(|_| b"{}".to_vec());

    parts.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);

    Response::from_parts(parts, Body::from(json_body))
}

/// Middleware that makes every response use the ResponseFormat envelope
pub async fn response_wrapper(
    req: Request<Body>,
    next: Next,
) -> Result<Response<Body>, Infallible> {
    let response: Response<Body> = next.run(req).await;

    if let Some(handled) = response.extensions().get::<HandlerResponse>() {
        log_formatted_response(&handled.format());
        return Ok(response);
    }

    let (parts, body) = response.into_parts();
    let bytes: Bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            error!("Failed to read response body: {}", err);
            Bytes::new()
        }
    };

    let wrapped: ResponseFormat = ResponseFormat {
        status_code: parts.status.as_u16(),
        status: parts.status.is_success(),
        message: Some(message_from_body(&parts, &bytes)),
        data: None,
        error: None,
    };

    log_formatted_response(&wrapped);

    Ok(build_final_response(parts, &wrapped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_carries_data_only() {
        let format: ResponseFormat = HandlerResponse::new(StatusCode::OK)
            .data(serde_json::json!([{ "1": 1 }]))
            .format();

        let json: Value = serde_json::to_value(&format).unwrap();
        assert_eq!(json, serde_json::json!({ "status_code": 200, "status": true, "data": [{ "1": 1 }] }));
    }

    #[test]
    fn error_envelope_is_marked_unsuccessful() {
        let format: ResponseFormat = HandlerResponse::new(StatusCode::INTERNAL_SERVER_ERROR)
            .message("Error executing query")
            .error("Table 'app.nope' doesn't exist")
            .format();

        assert_eq!(format.status_code, 500);
        assert!(!format.status);
        assert_eq!(format.error.as_deref(), Some("Table 'app.nope' doesn't exist"));
    }

    #[test]
    fn empty_bodies_fall_back_to_the_reason_phrase() {
        let (parts, _) = Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(())
            .unwrap()
            .into_parts();

        assert_eq!(message_from_body(&parts, &Bytes::new()), "Not Found");
        assert_eq!(message_from_body(&parts, &Bytes::from_static(b"no route")), "no route");
    }
}
