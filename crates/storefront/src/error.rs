//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Responses are JSON: `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use warung_core::analytics::RangeError;
use warung_core::pagination::PageError;

use crate::db::RepositoryError;
use crate::models::ValidationError;
use crate::services::{
    CheckoutError, IdentityError, NotificationError, PaymentError, ShippingError,
};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Checkout could not be completed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Payment notification could not be applied.
    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    /// Identity event could not be applied.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Payment gateway call failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Shipping-rate API call failed.
    #[error("Shipping error: {0}")]
    Shipping(#[from] ShippingError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but may not do this.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with existing data.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PageError> for AppError {
    fn from(err: PageError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<RangeError> for AppError {
    fn from(err: RangeError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

const INTERNAL_MESSAGE: &str = "Internal server error";
const GATEWAY_MESSAGE: &str = "Payment gateway error";
const SHIPPING_MESSAGE: &str = "Shipping service error";

fn repository_response(err: &RepositoryError) -> (StatusCode, String) {
    match err {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
        RepositoryError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        RepositoryError::Rejected(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
        }
    }
}

fn shipping_response(err: &ShippingError) -> (StatusCode, String) {
    match err {
        ShippingError::ServiceUnavailable(service) => (
            StatusCode::BAD_REQUEST,
            format!("Courier service not available: {service}"),
        ),
        _ => (StatusCode::BAD_GATEWAY, SHIPPING_MESSAGE.to_string()),
    }
}

impl AppError {
    /// Status code and client-safe message.
    fn response_parts(&self) -> (StatusCode, String) {
        match self {
            Self::Database(err) => repository_response(err),
            Self::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart
                | CheckoutError::InsufficientStock { .. }
                | CheckoutError::AmountOverflow => (StatusCode::BAD_REQUEST, err.to_string()),
                CheckoutError::AddressNotFound => (StatusCode::NOT_FOUND, err.to_string()),
                CheckoutError::Shipping(inner) => shipping_response(inner),
                CheckoutError::Payment(_) => (StatusCode::BAD_GATEWAY, GATEWAY_MESSAGE.to_string()),
                CheckoutError::BaseUrl(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
                }
                CheckoutError::Repository(inner) => repository_response(inner),
            },
            Self::Notification(err) => match err {
                NotificationError::UnknownOrder(_) => (StatusCode::NOT_FOUND, err.to_string()),
                NotificationError::Payment(_) => {
                    (StatusCode::BAD_GATEWAY, GATEWAY_MESSAGE.to_string())
                }
                NotificationError::Repository(inner) => repository_response(inner),
            },
            Self::Identity(err) => match err {
                IdentityError::Repository(inner) => repository_response(inner),
                _ => (StatusCode::BAD_REQUEST, err.to_string()),
            },
            Self::Payment(_) => (StatusCode::BAD_GATEWAY, GATEWAY_MESSAGE.to_string()),
            Self::Shipping(err) => shipping_response(err),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, format!("Not found: {msg}")),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "Too many requests".to_string()),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.response_parts();

        // Capture server and upstream errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Called by the identity extractors so errors are associated with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added product", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn get_body(err: AppError) -> serde_json::Value {
        let bytes = to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Conflict("test".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_error_mapping() {
        assert_eq!(
            get_status(RepositoryError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(RepositoryError::Conflict("slug already exists".into()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(RepositoryError::Rejected("product is out of stock".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(RepositoryError::DataCorruption("bad email".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upstream_errors_are_bad_gateway() {
        assert_eq!(
            get_status(PaymentError::Unauthorized.into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(CheckoutError::Payment(PaymentError::RateLimited(30)).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(ShippingError::Unauthorized.into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(CheckoutError::Shipping(ShippingError::ServiceUnavailable("jne YES".into())).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_checkout_and_notification_mapping() {
        assert_eq!(
            get_status(CheckoutError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CheckoutError::AddressNotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(NotificationError::UnknownOrder("ORD-1".into()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(IdentityError::MissingEmail.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(PageError::MalformedCursor.into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_body_hides_internal_details() {
        let body = get_body(AppError::Internal("connection refused at 10.0.0.3".into())).await;
        assert_eq!(body["error"], "Internal server error");

        let body = get_body(RepositoryError::Rejected("quantity cannot go below 1".into()).into()).await;
        assert_eq!(body["error"], "quantity cannot go below 1");
    }
}
