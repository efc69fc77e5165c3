//! HTTP error mapping.
//!
//! Every handler returns `Result<T, ApiError>`. Server-side failures are
//! logged and answered with a generic message; storage details never reach
//! the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::checkout::{CheckoutError, SubmissionError};
use crate::orders::AdminError;
use crate::storage::RepositoryError;
use crate::StorefrontError;

#[derive(Debug)]
pub struct ApiError(pub StorefrontError);

impl<E> From<E> for ApiError
where
    E: Into<StorefrontError>,
{
    fn from(err: E) -> Self { Self(err.into()) }
}

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::OrderNotFound(_) | RepositoryError::ProductNotFound(_) => StatusCode::NOT_FOUND,
        RepositoryError::InsufficientStock { .. } | RepositoryError::PriceChanged { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        RepositoryError::Corrupt(_) | RepositoryError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn submission_status(err: &SubmissionError) -> StatusCode {
    match err {
        SubmissionError::InFlight => StatusCode::CONFLICT,
        SubmissionError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        SubmissionError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SubmissionError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            StorefrontError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StorefrontError::Checkout(err) => match err {
                CheckoutError::EmptyCart => StatusCode::BAD_REQUEST,
                CheckoutError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CheckoutError::Submission(e) => submission_status(e),
            },
            StorefrontError::Submission(err) => submission_status(err),
            StorefrontError::Admin(err) => match err {
                AdminError::Unauthorized => StatusCode::UNAUTHORIZED,
                AdminError::NotFound(_) => StatusCode::NOT_FOUND,
                AdminError::InvalidStatus(_) | AdminError::ConfirmationRequired => StatusCode::BAD_REQUEST,
                AdminError::Storage(e) => repository_status(e),
            },
            StorefrontError::Repository(err) => repository_status(err),
            StorefrontError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// The input field at fault, when there is one.
    fn field(&self) -> Option<&'static str> {
        match &self.0 {
            StorefrontError::Validation(v)
            | StorefrontError::Checkout(CheckoutError::Validation(v))
            | StorefrontError::Checkout(CheckoutError::Submission(SubmissionError::Rejected(v)))
            | StorefrontError::Submission(SubmissionError::Rejected(v)) => Some(v.field),
            StorefrontError::Admin(AdminError::InvalidStatus(_)) => Some("status"),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() && status != StatusCode::GATEWAY_TIMEOUT {
            tracing::error!(error = %self.0, "Request error");
            "Internal server error".to_string()
        } else {
            self.0.to_string()
        };
        let body = match self.field() {
            Some(field) => json!({ "error": message, "field": field }),
            None => json!({ "error": message }),
        };
        (status, Json(body)).into_response()
    }
}
