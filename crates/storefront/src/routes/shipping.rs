//! Shipping lookup route handlers.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::services::shipping::{City, CostRequest, CourierCosts, Province};
use crate::state::AppState;

/// City lookup parameters.
#[derive(Debug, Deserialize)]
pub struct CitiesQuery {
    pub province_id: Option<String>,
}

/// All provinces.
#[instrument(skip(state))]
pub async fn provinces(State(state): State<AppState>) -> Result<Json<Vec<Province>>> {
    Ok(Json(state.shipping().provinces().await?))
}

/// Cities of one province.
#[instrument(skip(state))]
pub async fn cities(
    State(state): State<AppState>,
    Query(query): Query<CitiesQuery>,
) -> Result<Json<Vec<City>>> {
    let province_id = query
        .province_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("province_id is required".to_string()))?;
    Ok(Json(state.shipping().cities(province_id).await?))
}

/// Every service a courier offers for a route.
#[instrument(skip(state, request))]
pub async fn cost(
    State(state): State<AppState>,
    Json(request): Json<CostRequest>,
) -> Result<Json<Vec<CourierCosts>>> {
    let request = validate_cost(request)?;
    Ok(Json(state.shipping().cost(&request).await?))
}

fn validate_cost(request: CostRequest) -> Result<CostRequest> {
    let destination = request.destination.trim().to_owned();
    let courier = request.courier.trim().to_lowercase();
    if destination.is_empty() {
        return Err(AppError::BadRequest("destination is required".to_string()));
    }
    if courier.is_empty() {
        return Err(AppError::BadRequest("courier is required".to_string()));
    }
    if request.weight == 0 {
        return Err(AppError::BadRequest("weight must be at least 1 gram".to_string()));
    }
    Ok(CostRequest {
        origin: request
            .origin
            .map(|o| o.trim().to_owned())
            .filter(|o| !o.is_empty()),
        destination,
        weight: request.weight,
        courier,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(destination: &str, weight: u32, courier: &str) -> CostRequest {
        CostRequest {
            origin: Some(" ".to_owned()),
            destination: destination.to_owned(),
            weight,
            courier: courier.to_owned(),
        }
    }

    #[test]
    fn test_cost_request_is_normalized() {
        let valid = validate_cost(request(" 23 ", 1200, " JNE ")).unwrap();
        assert_eq!(valid.destination, "23");
        assert_eq!(valid.courier, "jne");
        assert_eq!(valid.origin, None);
    }

    #[test]
    fn test_cost_request_rejections() {
        assert!(validate_cost(request("", 1000, "jne")).is_err());
        assert!(validate_cost(request("23", 0, "jne")).is_err());
        assert!(validate_cost(request("23", 1000, "  ")).is_err());
    }
}
