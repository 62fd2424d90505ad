use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::usecases::{
    auth_emails::AuthEmailError, availability::AvailabilityError,
    booking_payments::BookingPaymentError, notifications::NotificationError,
};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: u16,
    pub error: String,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Error body shared by every handler: `{ "success": false, "code": ..., "error": ... }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Builds the response for a use-case error. Server-side failures never echo their
    /// cause to the client.
    pub fn from_status(status: StatusCode, err: &impl std::fmt::Display) -> Self {
        if status.is_server_error() && status != StatusCode::BAD_GATEWAY {
            return Self::new(status, "Internal server error");
        }
        Self::new(status, err.to_string())
    }

    /// Extra top-level fields merged into the body. Must be a JSON object.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            success: false,
            code: self.status.as_u16(),
            error: self.message,
            details: self.details,
        });

        (self.status, body).into_response()
    }
}

impl From<BookingPaymentError> for ApiError {
    fn from(err: BookingPaymentError) -> Self {
        ApiError::from_status(err.status_code(), &err)
    }
}

impl From<AvailabilityError> for ApiError {
    fn from(err: AvailabilityError) -> Self {
        ApiError::from_status(err.status_code(), &err)
    }
}

impl From<NotificationError> for ApiError {
    fn from(err: NotificationError) -> Self {
        let api_error = ApiError::from_status(err.status_code(), &err);
        match err {
            NotificationError::RateLimited(retry_after_secs) => {
                api_error.with_details(json!({ "retry_after_secs": retry_after_secs }))
            }
            _ => api_error,
        }
    }
}

impl From<AuthEmailError> for ApiError {
    fn from(err: AuthEmailError) -> Self {
        let api_error = ApiError::from_status(err.status_code(), &err);
        match err {
            AuthEmailError::RateLimited(retry_after_secs) => {
                api_error.with_details(json!({ "retry_after_secs": retry_after_secs }))
            }
            AuthEmailError::VerificationFailed(attempted) => {
                api_error.with_details(json!({ "attempted_methods": attempted }))
            }
            _ => api_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_are_masked() {
        let err = ApiError::from_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            &"connection refused at 10.0.0.3",
        );
        assert_eq!(err.message, "Internal server error");
    }

    #[test]
    fn client_errors_keep_their_message() {
        let err = ApiError::from_status(StatusCode::CONFLICT, &"illegal payment transition");
        assert_eq!(err.message, "illegal payment transition");
    }

    #[test]
    fn body_flattens_details() {
        let body = ErrorResponse {
            success: false,
            code: 429,
            error: "Too many requests".into(),
            details: Some(json!({ "retry_after_secs": 42 })),
        };

        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({
                "success": false,
                "code": 429,
                "error": "Too many requests",
                "retry_after_secs": 42
            })
        );
    }

    #[test]
    fn rate_limited_errors_carry_retry_after() {
        let err = ApiError::from(AuthEmailError::RateLimited(30));
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.details, Some(json!({ "retry_after_secs": 30 })));
    }

    #[test]
    fn failed_verification_lists_attempted_methods() {
        let err = ApiError::from(AuthEmailError::VerificationFailed(vec!["token_hash", "pkce_code"]));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            err.details,
            Some(json!({ "attempted_methods": ["token_hash", "pkce_code"] }))
        );
    }
}
