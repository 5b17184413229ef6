//! Inbound webhooks from the payment gateway and the identity provider.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
};
use secrecy::ExposeSecret;
use tracing::{instrument, warn};

use crate::error::{AppError, Result};
use crate::services::{
    IdentityEvent, IdentityService, NotificationAck, NotificationService, PaymentNotification,
};
use crate::state::AppState;

/// Payment notification.
///
/// The body only identifies the order; the authoritative status is fetched
/// back from the gateway before anything is written.
#[instrument(skip(state, notification))]
pub async fn payment(
    State(state): State<AppState>,
    Json(notification): Json<PaymentNotification>,
) -> Result<Json<NotificationAck>> {
    let outcome = NotificationService::new(state.pool(), state.payment())
        .handle(&notification)
        .await?;
    Ok(Json(outcome.into()))
}

/// Identity provider user event, authenticated with a shared bearer secret.
#[instrument(skip(state, headers, body))]
pub async fn identity(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let secret = state.config().identity.webhook_secret.expose_secret();
    let authorized = bearer_token(&headers).is_some_and(|token| constant_time_compare(token, secret));
    if !authorized {
        warn!("Rejected identity webhook with invalid credentials");
        return Err(AppError::Unauthorized("Invalid webhook credentials".to_string()));
    }

    let event: IdentityEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid event payload: {e}")))?;

    IdentityService::new(state.pool()).apply(event).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
