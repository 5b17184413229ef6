//! Identity extractors.
//!
//! Requests are authenticated by the identity provider's proxy, which
//! forwards the verified subject in a header (`x-identity-subject` unless
//! configured otherwise). These extractors resolve that subject to a
//! `shop.users` row.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::CurrentUser;
use crate::state::AppState;

/// Extractor that requires a signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireUser(user): RequireUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct RequireUser(pub CurrentUser);

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireUser`, this does not reject anonymous requests. A subject
/// with no matching user is treated as anonymous.
pub struct OptionalUser(pub Option<CurrentUser>);

/// Extractor that requires a signed-in admin.
///
/// Anonymous callers get 401, signed-in non-admins 403.
pub struct RequireAdmin(pub CurrentUser);

/// Resolve the forwarded subject, memoized in request extensions.
async fn resolve(parts: &mut Parts, state: &AppState) -> Result<Option<CurrentUser>, AppError> {
    if let Some(user) = parts.extensions.get::<CurrentUser>() {
        return Ok(Some(user.clone()));
    }

    let header = state.config().identity.subject_header.as_str();
    let Some(subject) = parts
        .headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    else {
        return Ok(None);
    };

    let user = UserRepository::new(state.pool())
        .get_by_external_id(subject)
        .await?
        .map(CurrentUser::from);

    if let Some(user) = &user {
        set_sentry_user(&user.id, Some(user.email.as_str()));
        tracing::Span::current().record("user_id", tracing::field::display(user.id));
        parts.extensions.insert(user.clone());
    }

    Ok(user)
}

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        resolve(parts, &state)
            .await?
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("Sign in required".to_string()))
    }
}

impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        Ok(Self(resolve(parts, &state).await?))
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(AppError::Forbidden(
                "Only admins can access this resource".to_string(),
            ));
        }

        Ok(Self(user))
    }
}
