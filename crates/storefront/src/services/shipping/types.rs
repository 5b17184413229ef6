//! `RajaOngkir` request and response types.

use serde::{Deserialize, Serialize};

use warung_core::Rupiah;

#[derive(Debug, Deserialize)]
pub(super) struct Envelope<T> {
    pub rajaongkir: Results<T>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Results<T> {
    pub results: T,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorEnvelope {
    pub rajaongkir: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorBody {
    pub status: ErrorStatus,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorStatus {
    pub description: String,
}

/// A province.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Province {
    pub province_id: String,
    pub province: String,
}

/// A city or regency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub city_id: String,
    pub province_id: String,
    pub province: String,
    /// `Kota` or `Kabupaten`.
    #[serde(rename = "type")]
    pub city_type: String,
    pub city_name: String,
    pub postal_code: String,
}

/// Cost lookup as sent by clients.
#[derive(Debug, Clone, Deserialize)]
pub struct CostRequest {
    /// City id; defaults to the warehouse city.
    #[serde(default)]
    pub origin: Option<String>,
    pub destination: String,
    /// Grams.
    pub weight: u32,
    /// Courier code such as `jne`, `pos` or `tiki`.
    pub courier: String,
}

#[derive(Debug, Serialize)]
pub(super) struct CostForm<'a> {
    pub origin: &'a str,
    pub destination: &'a str,
    pub weight: u32,
    pub courier: &'a str,
}

/// Services offered by one courier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourierCosts {
    pub code: String,
    pub name: String,
    pub costs: Vec<ServiceCost>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCost {
    pub service: String,
    pub description: String,
    pub cost: Vec<CostValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostValue {
    pub value: i64,
    /// Estimated days in transit, e.g. `2-3`.
    pub etd: String,
    #[serde(default)]
    pub note: String,
}

/// Price of one courier service for a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceQuote {
    pub courier: String,
    pub service: String,
    pub description: String,
    pub cost: Rupiah,
    pub etd: String,
}

/// Pick `service` (case-insensitive) out of a cost response.
#[must_use]
pub fn find_service(couriers: &[CourierCosts], service: &str) -> Option<ServiceQuote> {
    couriers.iter().find_map(|courier| {
        courier
            .costs
            .iter()
            .find(|cost| cost.service.eq_ignore_ascii_case(service))
            .and_then(|cost| {
                cost.cost.first().map(|value| ServiceQuote {
                    courier: courier.code.clone(),
                    service: cost.service.clone(),
                    description: cost.description.clone(),
                    cost: Rupiah::new(value.value),
                    etd: value.etd.clone(),
                })
            })
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const COST_RESPONSE: &str = r#"{
        "rajaongkir": {
            "status": {"code": 200, "description": "OK"},
            "results": [{
                "code": "jne",
                "name": "Jalur Nugraha Ekakurir (JNE)",
                "costs": [
                    {"service": "OKE", "description": "Ongkos Kirim Ekonomis",
                     "cost": [{"value": 38000, "etd": "4-5", "note": ""}]},
                    {"service": "REG", "description": "Layanan Reguler",
                     "cost": [{"value": 44000, "etd": "2-3", "note": ""}]}
                ]
            }]
        }
    }"#;

    #[test]
    fn test_find_service() {
        let envelope: Envelope<Vec<CourierCosts>> = serde_json::from_str(COST_RESPONSE).unwrap();
        let couriers = envelope.rajaongkir.results;

        let quote = find_service(&couriers, "reg").unwrap();
        assert_eq!(quote.courier, "jne");
        assert_eq!(quote.service, "REG");
        assert_eq!(quote.cost, Rupiah::new(44_000));
        assert_eq!(quote.etd, "2-3");

        assert!(find_service(&couriers, "YES").is_none());
    }

    #[test]
    fn test_city_type_field() {
        let city: City = serde_json::from_str(
            r#"{"city_id":"153","province_id":"6","province":"DKI Jakarta",
                "type":"Kota","city_name":"Jakarta Selatan","postal_code":"12230"}"#,
        )
        .unwrap();
        assert_eq!(city.city_type, "Kota");
    }

    #[test]
    fn test_error_envelope() {
        let body: ErrorEnvelope = serde_json::from_str(
            r#"{"rajaongkir":{"status":{"code":400,"description":"Invalid key."}}}"#,
        )
        .unwrap();
        assert_eq!(body.rajaongkir.status.description, "Invalid key.");
    }
}
