use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::payments::PaymentError;
use crate::store::StoreError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Payment not completed: {0}")]
    PaymentIncomplete(String),

    #[error("Database error")]
    DatabaseError(#[from] StoreError),

    #[error("Payment provider error")]
    PaymentProviderError(#[from] PaymentError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PaymentIncomplete(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::PaymentProviderError(e) => match e {
                PaymentError::InvalidSignature(_) | PaymentError::MalformedPayload(_) => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::PaymentIncomplete(_) => "PAYMENT_NOT_COMPLETED",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::PaymentProviderError(PaymentError::InvalidSignature(_))
            | AppError::PaymentProviderError(PaymentError::MalformedPayload(_)) => {
                "WEBHOOK_REJECTED"
            }
            AppError::PaymentProviderError(_) => "PAYMENT_PROVIDER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
            AppError::PaymentProviderError(e) => {
                error!(error = %e, "Payment provider error");
            }
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::PaymentIncomplete(msg) => {
                warn!(code = self.code(), message = %msg, "Request rejected");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level message to the client
        let public_message = match &self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::PaymentIncomplete(msg) => msg.clone(),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            AppError::PaymentProviderError(PaymentError::InvalidSignature(_)) => {
                "Webhook signature verification failed".to_string()
            }
            AppError::PaymentProviderError(PaymentError::MalformedPayload(_)) => {
                "Webhook payload could not be parsed".to_string()
            }
            AppError::PaymentProviderError(_) => "The payment provider is unavailable".to_string(),
        };

        error_response(code, public_message, None, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::DatabaseError(StoreError::Unavailable("down".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_signature_failure_is_client_error() {
        let err = AppError::from(PaymentError::InvalidSignature("bad".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "WEBHOOK_REJECTED");
    }

    #[test]
    fn test_upstream_payment_failure_is_server_error() {
        let err = AppError::from(PaymentError::Api {
            status: 503,
            message: "down".into(),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "PAYMENT_PROVIDER_ERROR");
    }
}
