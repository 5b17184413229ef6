//! Session route handler.

use axum::Json;

use crate::middleware::OptionalUser;
use crate::models::CurrentUser;

/// The signed-in user, or `null` for anonymous callers.
pub async fn session(OptionalUser(user): OptionalUser) -> Json<Option<CurrentUser>> {
    Json(user)
}
