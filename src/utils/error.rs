// Typed errors returned by the SQL endpoints

use std::error::Error as StdError;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::utils::response_handler::HandlerResponse;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or invalid request fields
    #[error("{0}")]
    Validation(&'static str),

    /// The body could not be read as JSON
    #[error("{}", .0.body_text())]
    Rejected(JsonRejection),

    /// Verification failed; the driver message is the whole answer
    #[error("{}", driver_message(.0))]
    Unverified(sqlx::Error),

    #[error("Error connecting to MySQL")]
    Connect(#[source] sqlx::Error),

    #[error("Error executing query")]
    Query(#[source] sqlx::Error),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Rejected(rejection) => rejection.status(),
            Self::Unverified(_) | Self::Connect(_) | Self::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The server's own error text, without sqlx's "error returned from database: " prefix
pub fn driver_message(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db_err) => db_err.message().to_string(),
        other => other.to_string(),
    }
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Rejected(rejection)
    }
}

impl From<GatewayError> for HandlerResponse {
    fn from(err: GatewayError) -> Self {
        let response: HandlerResponse = HandlerResponse::new(err.status_code()).message(err.to_string());

        match &err {
            GatewayError::Connect(source) | GatewayError::Query(source) => response.error(driver_message(source)),
            _ => response,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match &self {
            Self::Validation(_) | Self::Rejected(_) => tracing::warn!("Rejected request: {}", self),
            _ => tracing::error!("{}: {:?}", self, self.source()),
        }

        HandlerResponse::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error as StdError, fmt};

    use sqlx::error::{DatabaseError, ErrorKind};

    use super::*;

    const ACCESS_DENIED: &str = "Access denied for user 'root'@'localhost' (using password: YES)";

    #[derive(Debug)]
    struct ServerError(&'static str);

    impl fmt::Display for ServerError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl StdError for ServerError {}

    impl DatabaseError for ServerError {
        fn message(&self) -> &str {
            self.0
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    fn server_error(message: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(ServerError(message)))
    }

    #[test]
    fn validation_errors_map_to_400_without_detail() {
        let response: HandlerResponse = GatewayError::Validation("Invalid table name").into();

        assert_eq!(response.status_code, StatusCode::BAD_REQUEST);
        assert_eq!(response.message.as_deref(), Some("Invalid table name"));
        assert_eq!(response.error, None);
    }

    #[test]
    fn query_errors_carry_the_driver_message() {
        let err: GatewayError = GatewayError::Query(sqlx::Error::Protocol("table missing".into()));
        let response: HandlerResponse = err.into();

        assert_eq!(response.status_code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.message.as_deref(), Some("Error executing query"));
        assert!(response.error.unwrap().contains("table missing"));
    }

    #[test]
    fn failed_verification_reports_the_driver_message_itself() {
        let err: GatewayError = GatewayError::Unverified(sqlx::Error::Protocol("access denied".into()));
        let response: HandlerResponse = err.into();

        assert_eq!(response.status_code, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.message.unwrap().contains("access denied"));
        assert_eq!(response.error, None);
    }

    #[test]
    fn failed_verification_shows_the_server_message_unprefixed() {
        let response: HandlerResponse = GatewayError::Unverified(server_error(ACCESS_DENIED)).into();

        assert_eq!(response.message.as_deref(), Some(ACCESS_DENIED));
    }

    #[test]
    fn query_error_detail_is_the_server_message_unprefixed() {
        let response: HandlerResponse =
            GatewayError::Query(server_error("Table 'app.missing' doesn't exist")).into();

        assert_eq!(response.message.as_deref(), Some("Error executing query"));
        assert_eq!(response.error.as_deref(), Some("Table 'app.missing' doesn't exist"));
    }

    #[test]
    fn connect_error_detail_is_the_server_message_unprefixed() {
        let response: HandlerResponse = GatewayError::Connect(server_error(ACCESS_DENIED)).into();

        assert_eq!(response.message.as_deref(), Some("Error connecting to MySQL"));
        assert_eq!(response.error.as_deref(), Some(ACCESS_DENIED));
    }
}
