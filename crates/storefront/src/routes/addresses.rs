//! Address route handlers.
//!
//! Reads are open to anonymous callers and return empty results; writes
//! require a signed-in user and keep the single-main-address invariant.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use warung_core::AddressId;

use crate::db::AddressRepository;
use crate::error::Result;
use crate::middleware::{OptionalUser, RequireUser};
use crate::models::{Address, AddressInput};
use crate::state::AppState;

/// The caller's addresses, newest first.
#[instrument(skip(state, user))]
pub async fn index(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
) -> Result<Json<Vec<Address>>> {
    let Some(user) = user else {
        return Ok(Json(Vec::new()));
    };
    Ok(Json(AddressRepository::new(state.pool()).list(user.id).await?))
}

/// The caller's main address, or `null`.
#[instrument(skip(state, user))]
pub async fn main(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
) -> Result<Json<Option<Address>>> {
    let Some(user) = user else {
        return Ok(Json(None));
    };
    Ok(Json(AddressRepository::new(state.pool()).main(user.id).await?))
}

/// Up to two of the caller's other addresses.
#[instrument(skip(state, user))]
pub async fn others(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
) -> Result<Json<Vec<Address>>> {
    let Some(user) = user else {
        return Ok(Json(Vec::new()));
    };
    Ok(Json(AddressRepository::new(state.pool()).others(user.id).await?))
}

/// Add an address. The first address always becomes main.
#[instrument(skip(state, user, input))]
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(input): Json<AddressInput>,
) -> Result<(StatusCode, Json<Address>)> {
    let address = input.validate()?;
    let created = AddressRepository::new(state.pool())
        .create(user.id, &address)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Replace one of the caller's addresses.
#[instrument(skip(state, user, input))]
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<AddressId>,
    Json(input): Json<AddressInput>,
) -> Result<Json<Address>> {
    let address = input.validate()?;
    let updated = AddressRepository::new(state.pool())
        .update(user.id, id, &address)
        .await?;
    Ok(Json(updated))
}

/// Delete one of the caller's addresses. Deleting the main address promotes
/// the newest remaining one.
#[instrument(skip(state, user))]
pub async fn delete(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<AddressId>,
) -> Result<StatusCode> {
    AddressRepository::new(state.pool())
        .delete(user.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
